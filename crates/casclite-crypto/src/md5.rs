//! MD5 content keys, encoded keys and their truncated local-index form

use crate::CryptoError;
use binrw::BinRead;
use md5::{Digest, Md5};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

/// Number of leading encoded-key bytes stored in local shard indices.
pub const TRUNCATED_KEY_LEN: usize = 9;

fn md5_digest(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    finish(hasher)
}

fn finish(hasher: Md5) -> [u8; 16] {
    let result = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&result);
    bytes
}

fn parse_hex<const N: usize>(text: &str) -> Result<[u8; N], CryptoError> {
    let mut bytes = [0u8; N];
    hex::decode_to_slice(text.trim(), &mut bytes)?;
    Ok(bytes)
}

fn copy_exact<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CryptoError> {
    <[u8; N]>::try_from(bytes).map_err(|_| CryptoError::InvalidKeySize {
        expected: N,
        actual: bytes.len(),
    })
}

/// Content key (MD5 of the decoded file) identifying content independent of its name
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey([u8; 16]);

impl ContentKey {
    /// Create content key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create content key from data by computing MD5 hash
    pub fn from_data(data: &[u8]) -> Self {
        Self(md5_digest(data))
    }

    /// Compute the content key of everything remaining in `reader`.
    ///
    /// Used to verify whole files on disk without loading them at once.
    pub fn from_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut hasher = Md5::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(Self(finish(hasher)))
    }

    /// Parse content key from hex string
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        parse_hex(hex).map(Self)
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for ContentKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        copy_exact(bytes).map(Self)
    }
}

impl FromStr for ContentKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Encoding key identifying one specific on-archive encoding of some content
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodingKey([u8; 16]);

impl EncodingKey {
    /// Create encoding key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Create encoding key from data by computing MD5 hash
    pub fn from_data(data: &[u8]) -> Self {
        Self(md5_digest(data))
    }

    /// Parse encoding key from hex string
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        parse_hex(hex).map(Self)
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 9 bytes, the form local shard indices are keyed by
    pub fn truncated(&self) -> TruncatedKey {
        let mut bytes = [0u8; TRUNCATED_KEY_LEN];
        bytes.copy_from_slice(&self.0[..TRUNCATED_KEY_LEN]);
        TruncatedKey(bytes)
    }
}

impl TryFrom<&[u8]> for EncodingKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        copy_exact(bytes).map(Self)
    }
}

impl FromStr for EncodingKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for EncodingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Truncated encoding key as stored in local `.idx` shard files
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TruncatedKey([u8; TRUNCATED_KEY_LEN]);

impl TruncatedKey {
    /// Create truncated key from raw bytes
    pub const fn from_bytes(bytes: [u8; TRUNCATED_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; TRUNCATED_KEY_LEN] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<EncodingKey> for TruncatedKey {
    fn from(key: EncodingKey) -> Self {
        key.truncated()
    }
}

impl fmt::Display for TruncatedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
