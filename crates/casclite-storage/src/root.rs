//! Root table: path hash -> content key per locale
//!
//! The stream is a sequence of blocks. Each block header names a locale
//! mask shared by every entry in the block; the entries' fields are stored
//! column-wise, all `unknown` values first, then `(content key, path hash)`
//! pairs. All integers are little-endian.

use crate::locale::LocaleFlags;
use crate::progress::{LoadPhase, PhaseProgress, ProgressObserver};
use crate::{Result, StorageError};
use binrw::{BinRead, BinReaderExt};
use casclite_crypto::ContentKey;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tracing::info;

/// Bytes per entry across both columns: `i32` + 16-byte key + `u64`
const ENTRY_SIZE: u64 = 4 + 16 + 8;

#[derive(Debug, BinRead)]
#[br(little)]
struct RawBlockHeader {
    count: i32,
    unknown: u32,
    locale: u32,
}

/// Header values shared by all entries of one root block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootBlock {
    /// Uninterpreted header field
    pub unknown: u32,
    /// Locales the block applies to, never empty
    pub flags: LocaleFlags,
}

/// One root table entry
#[derive(Debug, Clone)]
pub struct RootEntry {
    /// Block this entry was read from
    pub block: Arc<RootBlock>,
    /// Uninterpreted per-entry field
    pub unknown: i32,
    /// Content key of the file variant
    pub content_key: ContentKey,
    /// Hash of the logical path
    pub path_hash: u64,
}

impl RootEntry {
    /// Locale mask of the owning block
    pub fn locale(&self) -> LocaleFlags {
        self.block.flags
    }
}

/// Map from path hash to root entries in stream order
#[derive(Debug, Default)]
pub struct RootTable {
    entries: HashMap<u64, Vec<RootEntry>>,
    entry_count: usize,
    block_count: usize,
}

impl RootTable {
    /// Parse a decoded root table
    ///
    /// Fails with [`StorageError::CorruptRootBlock`] when a block declares
    /// an empty locale mask.
    pub fn parse(data: &[u8], observer: &dyn ProgressObserver) -> Result<Self> {
        let mut progress = PhaseProgress::start(observer, LoadPhase::Root);
        let total = data.len() as u64;
        let mut cursor = Cursor::new(data);
        let mut table = Self::default();

        while cursor.position() < total {
            let offset = cursor.position();
            let header: RawBlockHeader = cursor.read_le().map_err(|e| {
                StorageError::InvalidFormat(format!("root block header at {offset}: {e}"))
            })?;

            if header.locale == 0 {
                return Err(StorageError::CorruptRootBlock { offset });
            }
            let count = u64::try_from(header.count).map_err(|_| {
                StorageError::InvalidFormat(format!(
                    "root block at {offset} has negative count {}",
                    header.count
                ))
            })?;
            let available = total - cursor.position();
            if count.saturating_mul(ENTRY_SIZE) > available {
                return Err(StorageError::InvalidFormat(format!(
                    "root block at {offset} declares {count} entries \
                     but only {available} bytes remain"
                )));
            }

            let block = Arc::new(RootBlock {
                unknown: header.unknown,
                flags: LocaleFlags::new(header.locale),
            });
            table.read_block(&mut cursor, &block, count as usize)?;
            table.block_count += 1;
            progress.update(cursor.position(), total);
        }

        progress.finish();
        info!(
            "Root table: {} paths, {} entries in {} blocks",
            table.entries.len(),
            table.entry_count,
            table.block_count
        );
        Ok(table)
    }

    fn read_block(
        &mut self,
        cursor: &mut Cursor<&[u8]>,
        block: &Arc<RootBlock>,
        count: usize,
    ) -> Result<()> {
        let unknowns = (0..count)
            .map(|_| cursor.read_le::<i32>())
            .collect::<binrw::BinResult<Vec<_>>>()
            .map_err(truncated)?;

        for unknown in unknowns {
            let content_key: ContentKey = cursor.read_le().map_err(truncated)?;
            let path_hash: u64 = cursor.read_le().map_err(truncated)?;
            self.entries.entry(path_hash).or_default().push(RootEntry {
                block: Arc::clone(block),
                unknown,
                content_key,
                path_hash,
            });
            self.entry_count += 1;
        }
        Ok(())
    }

    /// Entries for a path hash, in stream order
    pub fn get(&self, path_hash: u64) -> Option<&[RootEntry]> {
        self.entries.get(&path_hash).map(Vec::as_slice)
    }

    /// True when at least one entry exists for the path hash
    pub fn contains(&self, path_hash: u64) -> bool {
        self.entries.get(&path_hash).is_some_and(|list| !list.is_empty())
    }

    /// Number of distinct path hashes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries across all path hashes
    pub const fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Number of blocks parsed
    pub const fn block_count(&self) -> usize {
        self.block_count
    }

    /// Iterate over path hashes and their entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[RootEntry])> {
        self.entries.iter().map(|(hash, list)| (*hash, list.as_slice()))
    }
}

fn truncated(e: binrw::Error) -> StorageError {
    StorageError::InvalidFormat(format!("truncated root entry: {e}"))
}
