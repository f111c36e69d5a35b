//! Jenkins96 path hashing for root table lookups
//!
//! Root tables key their entries by a 64-bit hash of the normalised file
//! path. The hash is Bob Jenkins' lookup3 `hashlittle2()` with both seeds
//! zeroed, combining the primary (`pc`) and secondary (`pb`) outputs.

use std::fmt;

/// Anything that can turn a logical path into the 64-bit root table key.
///
/// Implementations must be deterministic and keyless.
pub trait PathHasher: Send + Sync {
    /// Hash a logical file path
    fn hash_path(&self, path: &str) -> u64;
}

/// Default path hasher: uppercase ASCII, `\` separators, Jenkins96.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JenkinsPathHasher;

impl PathHasher for JenkinsPathHasher {
    fn hash_path(&self, path: &str) -> u64 {
        hash_path(path)
    }
}

/// Hash a logical path the way root tables expect it.
///
/// The path is uppercased (ASCII only) and `/` is replaced by `\` before
/// hashing, so `"World/Maps/a.wdt"` and `"WORLD\\MAPS\\A.WDT"` collide.
pub fn hash_path(path: &str) -> u64 {
    let normalised = path.to_ascii_uppercase().replace('/', "\\");
    Jenkins96::hash(normalised.as_bytes()).hash64
}

/// Jenkins96 hash result containing both 64-bit and 32-bit components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Jenkins96 {
    /// Primary 64-bit hash value (`pc << 32 | pb`)
    pub hash64: u64,
    /// Secondary 32-bit hash value (`pc`)
    pub hash32: u32,
}

impl Jenkins96 {
    /// Compute Jenkins96 hash of data
    pub fn hash(data: &[u8]) -> Self {
        let mut pc = 0u32;
        let mut pb = 0u32;
        hashlittle2(data, &mut pc, &mut pb);

        Self {
            hash64: (u64::from(pc) << 32) | u64::from(pb),
            hash32: pc,
        }
    }
}

impl fmt::Display for Jenkins96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:08x}", self.hash64, self.hash32)
    }
}

/// Compute Jenkins hash producing two 32-bit values
///
/// This is the `hashlittle2()` function from Bob Jenkins' lookup3.c.
/// `pc` and `pb` are the seeds on input and the two hash words on output.
///
/// # Examples
///
/// ```
/// use casclite_crypto::jenkins::hashlittle2;
///
/// let mut pc = 0u32;
/// let mut pb = 0u32;
/// hashlittle2(b"", &mut pc, &mut pb);
/// assert_eq!((pc, pb), (0xdead_beef, 0xdead_beef));
/// ```
pub fn hashlittle2(key: &[u8], pc: &mut u32, pb: &mut u32) {
    let init = 0xdead_beef_u32
        .wrapping_add(u32::try_from(key.len()).unwrap_or(u32::MAX))
        .wrapping_add(*pc);
    let mut a = init;
    let mut b = init;
    let mut c = init.wrapping_add(*pb);
    let mut k = key;

    while k.len() > 12 {
        a = a.wrapping_add(le_word(&k[0..4]));
        b = b.wrapping_add(le_word(&k[4..8]));
        c = c.wrapping_add(le_word(&k[8..12]));
        mix(&mut a, &mut b, &mut c);
        k = &k[12..];
    }

    // Zero-length input skips the final mix
    if k.is_empty() {
        *pc = c;
        *pb = b;
        return;
    }

    // Missing tail bytes contribute zero, same as lookup3's switch fallthrough
    let mut tail = [0u8; 12];
    tail[..k.len()].copy_from_slice(k);
    a = a.wrapping_add(le_word(&tail[0..4]));
    b = b.wrapping_add(le_word(&tail[4..8]));
    c = c.wrapping_add(le_word(&tail[8..12]));

    final_mix(&mut a, &mut b, &mut c);

    *pc = c;
    *pb = b;
}

fn le_word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Mix 3 u32 values reversibly
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);

    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);

    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);

    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

/// Final mixing of 3 u32 values
fn final_mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));

    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));

    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));

    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));

    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));

    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));

    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}
