//! Encoding table: content key -> encoded keys
//!
//! Only the content-key pages are read. The page index in front of them is
//! skipped and pages are found by scanning: each page is a run of entries
//! terminated by a zero key count and padded with zero bytes.

use crate::progress::{LoadPhase, PhaseProgress, ProgressObserver};
use crate::{Result, StorageError};
use binrw::{BinRead, BinReaderExt};
use casclite_crypto::{ContentKey, EncodingKey};
use std::collections::HashMap;
use std::io::{Cursor, Seek, SeekFrom};
use tracing::{info, warn};

/// Bytes per entry of the content-key page index
const PAGE_INDEX_ENTRY_SIZE: u64 = 32;

/// Fixed header in front of the encoding table
#[derive(Debug, Clone, BinRead)]
#[br(big, magic = b"EN")]
pub struct EncodingHeader {
    /// Format version
    pub version: u8,
    /// Content key length
    pub ckey_size: u8,
    /// Encoded key length
    pub ekey_size: u8,
    /// Content-key page size in KiB
    #[br(little)]
    pub ckey_page_size_kb: u16,
    /// Encoded-key page size in KiB
    #[br(little)]
    pub ekey_page_size_kb: u16,
    /// Number of content-key pages
    pub ckey_page_count: i32,
    /// Number of encoded-key pages
    pub ekey_page_count: i32,
    /// Unused flags byte
    pub flags: u8,
    /// Size of the encoding-spec string block
    pub espec_block_size: i32,
}

/// Declared size and encoded keys for one content key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingEntry {
    /// Decoded file size as declared by the table
    pub size: i32,
    /// Encoded keys in table order
    pub keys: Vec<EncodingKey>,
}

impl EncodingEntry {
    /// The key used for extraction; further keys are alternates
    pub fn first_key(&self) -> Option<&EncodingKey> {
        self.keys.first()
    }
}

/// Map from content key to its encodings
#[derive(Debug, Default)]
pub struct EncodingTable {
    entries: HashMap<ContentKey, EncodingEntry>,
    duplicates: usize,
}

impl EncodingTable {
    /// Parse a decoded encoding table
    ///
    /// At most `ckey_page_count` pages are scanned, stopping early at the
    /// end of the stream. When a content key repeats, the first entry stands.
    pub fn parse(data: &[u8], observer: &dyn ProgressObserver) -> Result<Self> {
        let mut progress = PhaseProgress::start(observer, LoadPhase::Encoding);
        let total = data.len() as u64;
        let mut cursor = Cursor::new(data);

        let header: EncodingHeader = cursor
            .read_be()
            .map_err(|e| StorageError::InvalidFormat(format!("encoding header: {e}")))?;

        if header.ckey_page_count < 0 || header.espec_block_size < 0 {
            return Err(StorageError::InvalidFormat(format!(
                "encoding header has negative sizes (pages {}, strings {})",
                header.ckey_page_count, header.espec_block_size
            )));
        }

        let skip = header.espec_block_size as u64
            + header.ckey_page_count as u64 * PAGE_INDEX_ENTRY_SIZE;
        cursor.seek(SeekFrom::Current(skip as i64))?;

        let mut table = Self::default();
        for _ in 0..header.ckey_page_count {
            if cursor.position() >= total {
                break;
            }
            table.read_page(&mut cursor)?;
            skip_zero_padding(&mut cursor);
            progress.update(cursor.position(), total);
        }

        progress.finish();
        if table.duplicates > 0 {
            warn!(
                "Encoding table: ignored {} duplicate content keys",
                table.duplicates
            );
        }
        info!("Encoding table: {} entries", table.entries.len());
        Ok(table)
    }

    fn read_page(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        loop {
            if remaining(cursor) < 2 {
                return Ok(());
            }
            let keys_count: u16 = cursor.read_le().map_err(truncated)?;
            if keys_count == 0 {
                return Ok(());
            }

            let size: i32 = cursor.read_be().map_err(truncated)?;
            let content_key: ContentKey = cursor.read_le().map_err(truncated)?;
            let keys = (0..keys_count)
                .map(|_| cursor.read_le::<EncodingKey>())
                .collect::<binrw::BinResult<Vec<_>>>()
                .map_err(truncated)?;

            if self.entries.contains_key(&content_key) {
                self.duplicates += 1;
                continue;
            }
            self.entries.insert(content_key, EncodingEntry { size, keys });
        }
    }

    /// Look up the encodings of a content key
    pub fn get(&self, key: &ContentKey) -> Option<&EncodingEntry> {
        self.entries.get(key)
    }

    /// Number of content keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&ContentKey, &EncodingEntry)> {
        self.entries.iter()
    }
}

fn remaining(cursor: &Cursor<&[u8]>) -> u64 {
    (cursor.get_ref().len() as u64).saturating_sub(cursor.position())
}

fn skip_zero_padding(cursor: &mut Cursor<&[u8]>) {
    let data = cursor.get_ref();
    let start = cursor.position() as usize;
    let zeros = data
        .get(start..)
        .map_or(0, |rest| rest.iter().take_while(|b| **b == 0).count());
    cursor.set_position((start + zeros) as u64);
}

fn truncated(e: binrw::Error) -> StorageError {
    StorageError::InvalidFormat(format!("truncated encoding entry: {e}"))
}
