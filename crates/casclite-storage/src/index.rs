//! Local shard index (.idx) loading
//!
//! Each installation keeps sixteen shard index files in `Data/data`, one
//! family per leading hex digit (`00` through `0f`). Newer generations of a
//! shard get higher version suffixes, so the lexicographically last file
//! name per shard is the current one.
//!
//! File layout (integers little-endian unless noted):
//!
//! ```text
//! u32 header_len, u32 header_hash, header_len opaque bytes
//! pad to 16-byte boundary
//! u32 data_len, u32 data_hash
//! data_len / 18 blocks:
//!   [9]  truncated encoded key
//!   u8   archive index high bits
//!   u32  archive index low bits + offset (big-endian)
//!   u32  record size
//! ```
//!
//! Keys are merged across shards with a first-wins policy: when the same
//! truncated key appears twice, in one file or across files, the entry seen
//! first in shard-then-block order is kept and later ones are dropped.

use crate::progress::{LoadPhase, PhaseProgress, ProgressObserver};
use crate::{Result, StorageError};
use binrw::{BinRead, BinReaderExt, BinResult, Endian};
use casclite_crypto::{EncodingKey, TruncatedKey};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Size of one index block in bytes
pub const INDEX_BLOCK_SIZE: usize = 18;

/// Number of shard families
pub const SHARD_COUNT: u8 = 16;

/// Mask of the offset bits inside the packed low word
const OFFSET_MASK: u32 = 0x3FFF_FFFF;

/// Custom binrw parser for archive location (5 bytes: 1 high + 4 packed)
fn parse_archive_location<R: Read + Seek>(
    reader: &mut R,
    _endian: Endian,
    _args: (),
) -> BinResult<ArchiveLocation> {
    let index_high = reader.read_be::<u8>()?;
    let index_low = reader.read_be::<u32>()?;
    Ok(ArchiveLocation::unpack(index_high, index_low))
}

/// Guarded block header (size + hash)
#[derive(Debug, Clone, BinRead)]
#[br(little)]
struct GuardedBlockHeader {
    /// Size of the block data
    block_size: u32,
    /// Checksum of the block, not verified
    _block_hash: u32,
}

/// One 18-byte block as stored on disk
///
/// Mixed endianness: the packed location is big-endian, the size is not.
#[derive(Debug, BinRead)]
#[br(big)]
struct RawIndexBlock {
    key: TruncatedKey,

    #[br(parse_with = parse_archive_location)]
    location: ArchiveLocation,

    #[br(little)]
    size: u32,
}

/// Archive number and byte offset of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveLocation {
    /// Archive file number (`data.NNN`), 10 bits
    pub archive_id: u16,
    /// Offset within the archive, 30 bits
    pub archive_offset: u32,
}

impl ArchiveLocation {
    /// Unpack from the on-disk high byte and big-endian low word
    ///
    /// The archive number is `(high << 2) | (low >> 30)`, kept at its full
    /// 10 bits; the offset is the low 30 bits of `low`.
    pub const fn unpack(index_high: u8, index_low: u32) -> Self {
        Self {
            archive_id: ((index_high as u16) << 2) | ((index_low >> 30) as u16),
            archive_offset: index_low & OFFSET_MASK,
        }
    }

    /// Pack into the on-disk high byte and low word
    pub const fn pack(&self) -> (u8, u32) {
        let index_high = (self.archive_id >> 2) as u8;
        let index_low =
            (((self.archive_id & 0x03) as u32) << 30) | (self.archive_offset & OFFSET_MASK);
        (index_high, index_low)
    }

    /// The five location bytes as stored in a block
    pub const fn to_bytes(&self) -> [u8; 5] {
        let (high, low) = self.pack();
        let low = low.to_be_bytes();
        [high, low[0], low[1], low[2], low[3]]
    }
}

/// Location and size of one record in the data archives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Where the record starts
    pub location: ArchiveLocation,
    /// Record size including its 30-byte local header
    pub size: u32,
}

impl IndexEntry {
    /// Create a new entry
    pub const fn new(archive_id: u16, archive_offset: u32, size: u32) -> Self {
        Self {
            location: ArchiveLocation {
                archive_id,
                archive_offset,
            },
            size,
        }
    }

    /// Get archive ID from location
    pub const fn archive_id(&self) -> u16 {
        self.location.archive_id
    }

    /// Get archive offset from location
    pub const fn archive_offset(&self) -> u32 {
        self.location.archive_offset
    }
}

/// Merged view of every current shard index file
#[derive(Debug, Default)]
pub struct LocalIndexTable {
    entries: HashMap<TruncatedKey, IndexEntry>,
    shard_files: Vec<PathBuf>,
    duplicates: usize,
}

impl LocalIndexTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the current index file of each shard in `dir`
    ///
    /// A file belongs to shard `n` when its name starts with the two-digit
    /// hex form of `n` (case-insensitive) and ends in `.idx`. Results are in
    /// ascending shard order.
    pub fn discover_shard_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut latest: BTreeMap<u8, (String, PathBuf)> = BTreeMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(shard) = shard_of(name) else {
                continue;
            };
            let key = name.to_ascii_lowercase();
            match latest.get(&shard) {
                Some((current, _)) if *current >= key => {}
                _ => {
                    latest.insert(shard, (key, path));
                }
            }
        }

        Ok(latest.into_values().map(|(_, path)| path).collect())
    }

    /// Load the current shard files from `dir`
    ///
    /// Fails with [`StorageError::MissingIndexFiles`] when no shard has a file.
    pub fn load(dir: &Path, observer: &dyn ProgressObserver) -> Result<Self> {
        let files = Self::discover_shard_files(dir)?;
        if files.is_empty() {
            return Err(StorageError::MissingIndexFiles(dir.to_path_buf()));
        }
        Self::load_files(&files, observer)
    }

    /// Load an explicit, ordered list of shard files
    ///
    /// The order decides which entry survives a duplicate key.
    pub fn load_files(files: &[PathBuf], observer: &dyn ProgressObserver) -> Result<Self> {
        let mut table = Self::new();
        let mut progress = PhaseProgress::start(observer, LoadPhase::LocalIndex);

        for (done, path) in files.iter().enumerate() {
            let file = File::open(path)?;
            let mut reader = BufReader::new(file);
            let inserted = table.merge_shard(&mut reader).map_err(|e| match e {
                StorageError::Index(msg) => {
                    StorageError::Index(format!("{}: {msg}", path.display()))
                }
                other => other,
            })?;
            debug!("Loaded {} entries from {}", inserted, path.display());
            table.shard_files.push(path.clone());
            progress.update(done as u64 + 1, files.len() as u64);
        }

        progress.finish();
        info!(
            "Local index: {} entries from {} shard files ({} duplicates dropped)",
            table.entries.len(),
            table.shard_files.len(),
            table.duplicates
        );
        Ok(table)
    }

    /// Parse one shard index stream and merge its blocks into the table
    ///
    /// Returns the number of newly inserted keys.
    pub fn merge_shard<R: Read + Seek>(&mut self, reader: &mut R) -> Result<usize> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header: GuardedBlockHeader = reader
            .read_le()
            .map_err(|e| StorageError::Index(format!("Failed to read header block: {e}")))?;

        let data_start = align_up(8 + u64::from(header.block_size), 16);
        if data_start + 8 > file_len {
            return Err(StorageError::Index(format!(
                "header of {} bytes leaves no room for the entry block",
                header.block_size
            )));
        }
        reader.seek(SeekFrom::Start(data_start))?;

        let data: GuardedBlockHeader = reader
            .read_le()
            .map_err(|e| StorageError::Index(format!("Failed to read entry block header: {e}")))?;

        let block_count = data.block_size as usize / INDEX_BLOCK_SIZE;
        let blocks_len = (block_count * INDEX_BLOCK_SIZE) as u64;
        if data_start + 8 + blocks_len > file_len {
            return Err(StorageError::Index(format!(
                "entry block of {} bytes at offset {} exceeds file length {}",
                data.block_size,
                data_start + 8,
                file_len
            )));
        }

        let mut raw = vec![0u8; blocks_len as usize];
        reader
            .read_exact(&mut raw)
            .map_err(|e| StorageError::Index(format!("Failed to read entry data: {e}")))?;

        let mut cursor = Cursor::new(raw);
        let mut inserted = 0;
        for _ in 0..block_count {
            let block: RawIndexBlock = cursor
                .read_be()
                .map_err(|e| StorageError::Index(format!("Failed to parse entry: {e}")))?;
            if self.entries.contains_key(&block.key) {
                self.duplicates += 1;
                continue;
            }
            self.entries.insert(
                block.key,
                IndexEntry {
                    location: block.location,
                    size: block.size,
                },
            );
            inserted += 1;
        }

        Ok(inserted)
    }

    /// Look up a truncated key
    pub fn get(&self, key: &TruncatedKey) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Look up the record for a full encoded key
    pub fn lookup(&self, key: &EncodingKey) -> Option<&IndexEntry> {
        self.get(&key.truncated())
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key was loaded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of blocks dropped by the first-wins policy
    pub const fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Shard files loaded, in load order
    pub fn shard_files(&self) -> &[PathBuf] {
        &self.shard_files
    }

    /// Iterate over all entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&TruncatedKey, &IndexEntry)> {
        self.entries.iter()
    }
}

/// Shard number encoded in an index file name, if it is one
fn shard_of(name: &str) -> Option<u8> {
    let prefix = name.get(..2)?;
    if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let is_idx = name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("idx"));
    if !is_idx {
        return None;
    }
    u8::from_str_radix(prefix, 16)
        .ok()
        .filter(|shard| *shard < SHARD_COUNT)
}

const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}
