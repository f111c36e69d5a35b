//! Data archive (`data.NNN`) access
//!
//! Archive files are opened lazily on first access and cached for the life
//! of the [`ArchiveHandles`] that owns them. Dropping it, or calling
//! [`ArchiveHandles::close_all`], closes every handle.

use crate::ArchiveError;
use crate::decoder::BlockDecoder;
use crate::index::IndexEntry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Size of the local record header in front of every payload
pub const LOCAL_HEADER_SIZE: u32 = 30;

/// Path of archive `id` inside `dir`
pub fn archive_path(dir: &Path, id: u16) -> PathBuf {
    dir.join(format!("data.{id:03}"))
}

/// Byte range of a record payload, header already skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSpan {
    /// Archive file number
    pub archive_id: u16,
    /// Payload start (`record offset + 30`)
    pub offset: u64,
    /// Payload length (`record size - 30`)
    pub length: u64,
}

impl ArchiveSpan {
    /// Payload span of an indexed record
    pub fn from_entry(entry: &IndexEntry) -> Result<Self, ArchiveError> {
        let length = entry
            .size
            .checked_sub(LOCAL_HEADER_SIZE)
            .ok_or(ArchiveError::RecordTooShort { size: entry.size })?;
        Ok(Self {
            archive_id: entry.archive_id(),
            offset: u64::from(entry.archive_offset()) + u64::from(LOCAL_HEADER_SIZE),
            length: u64::from(length),
        })
    }
}

/// Cache of open archive files keyed by archive number
#[derive(Debug)]
pub struct ArchiveHandles {
    dir: PathBuf,
    open: Mutex<HashMap<u16, File>>,
}

impl ArchiveHandles {
    /// Create an empty cache for archives in `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Directory archives are opened from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Seek to the span and decode exactly its length
    pub fn read_span(
        &self,
        span: &ArchiveSpan,
        decoder: &dyn BlockDecoder,
    ) -> Result<Vec<u8>, ArchiveError> {
        let mut open = self.open.lock();
        let file = match open.entry(span.archive_id) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let path = archive_path(&self.dir, span.archive_id);
                debug!("Opening archive {}", path.display());
                slot.insert(File::open(&path)?)
            }
        };

        file.seek(SeekFrom::Start(span.offset))?;
        let mut bounded = (&mut *file).take(span.length);
        decoder.decode(&mut bounded, span.length)
    }

    /// Number of archive files currently open
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Close every open archive file
    pub fn close_all(&self) {
        let mut open = self.open.lock();
        if !open.is_empty() {
            debug!("Closing {} archive handles", open.len());
        }
        open.clear();
    }
}

impl Drop for ArchiveHandles {
    fn drop(&mut self) {
        self.close_all();
    }
}
