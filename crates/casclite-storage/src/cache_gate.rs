//! Local copies of bootstrap tables
//!
//! The encoding and root tables are extracted from the archives on first
//! use and kept decoded at a fixed path. On later opens the copy is reused
//! only while its MD5 still equals the content key from configuration; a
//! stale copy is deleted and replaced by a fresh extraction.

use crate::Result;
use casclite_crypto::ContentKey;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How the bytes of a bootstrap table were obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The local copy matched and was read back
    Hit(Vec<u8>),
    /// The copy was missing or stale; bytes come from extraction
    Extracted(Vec<u8>),
}

impl CacheLookup {
    /// True when the local copy was reused
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The table bytes
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Hit(bytes) | Self::Extracted(bytes) => bytes,
        }
    }
}

/// Hash-checked local copy of one bootstrap table
#[derive(Debug, Clone)]
pub struct LocalCacheGate {
    path: PathBuf,
    expected: ContentKey,
}

impl LocalCacheGate {
    /// Gate the copy at `path` on content key `expected`
    pub fn new(path: impl AsRef<Path>, expected: ContentKey) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            expected,
        }
    }

    /// Location of the local copy
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Expected content key
    pub const fn expected(&self) -> &ContentKey {
        &self.expected
    }

    /// Read the local copy if it exists and matches
    ///
    /// A copy that exists but does not match is deleted.
    pub fn check(&self) -> Result<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached copy at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let actual = ContentKey::from_reader(&mut file)?;
        if actual != self.expected {
            debug!(
                "Cached copy {} has hash {actual}, expected {}; removing",
                self.path.display(),
                self.expected
            );
            drop(file);
            fs::remove_file(&self.path)?;
            return Ok(None);
        }

        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        debug!("Using cached copy {}", self.path.display());
        Ok(Some(bytes))
    }

    /// Return the matching local copy, or run `extract` and persist its output
    ///
    /// Extracted bytes are handed back directly rather than re-read from the
    /// file just written.
    pub fn open_or_extract<F>(&self, extract: F) -> Result<CacheLookup>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if let Some(bytes) = self.check()? {
            return Ok(CacheLookup::Hit(bytes));
        }

        let bytes = extract()?;
        let actual = ContentKey::from_data(&bytes);
        if actual != self.expected {
            warn!(
                "Extracted {} hashes to {actual}, expected {}; it will be re-extracted next time",
                self.path.display(),
                self.expected
            );
        }
        self.persist(&bytes)?;
        Ok(CacheLookup::Extracted(bytes))
    }

    fn persist(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = self.path.with_extension("partial");
        {
            let mut file = File::create(&partial)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&partial, &self.path)?;
        debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}
