//! Resolution pipeline over the three local tables
//!
//! Opening a [`CascHandler`] builds, in this order:
//!
//! 1. the local index from the current `.idx` shard files,
//! 2. the encoding table, read through its encoded key from configuration,
//! 3. the root table, whose encoded key is found in the encoding table.
//!
//! Both bootstrap tables go through a [`LocalCacheGate`] so a decoded copy
//! on disk is reused while its content key still matches.
//!
//! After construction all tables are immutable. Path lookups walk
//! path hash -> root entries -> content key -> encoded key -> truncated key
//! -> archive span, then hand the span to the [`BlockDecoder`].

use crate::archive::{ArchiveHandles, ArchiveSpan};
use crate::cache_gate::LocalCacheGate;
use crate::config::StorageConfig;
use crate::decoder::{BlockDecoder, PassthroughDecoder};
use crate::encoding::{EncodingEntry, EncodingTable};
use crate::index::{IndexEntry, LocalIndexTable};
use crate::locale::LocaleFlags;
use crate::namespace::NamespaceBuilder;
use crate::progress::{NoProgress, ProgressObserver};
use crate::root::{RootEntry, RootTable};
use crate::{ArchiveError, Result, StorageError};
use casclite_crypto::{ContentKey, EncodingKey, JenkinsPathHasher, PathHasher};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Table sizes and archive handle usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerStats {
    /// Distinct truncated keys in the local index
    pub local_index_entries: usize,
    /// Shard files the local index was built from
    pub shard_files: usize,
    /// Content keys in the encoding table
    pub encoding_entries: usize,
    /// Distinct path hashes in the root table
    pub root_paths: usize,
    /// Root entries across all paths
    pub root_entries: usize,
    /// Archive files currently open
    pub open_archives: usize,
}

/// Options for opening a [`CascHandler`]
pub struct HandlerBuilder<'a> {
    config: StorageConfig,
    decoder: Box<dyn BlockDecoder>,
    hasher: Box<dyn PathHasher>,
    progress: &'a dyn ProgressObserver,
}

impl<'a> HandlerBuilder<'a> {
    /// Start from a configuration with the passthrough decoder and Jenkins96 paths
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            decoder: Box::new(PassthroughDecoder),
            hasher: Box::new(JenkinsPathHasher),
            progress: &NoProgress,
        }
    }

    /// Use `decoder` for every archive payload
    #[must_use]
    pub fn decoder(mut self, decoder: impl BlockDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Use `hasher` to turn paths into root table keys
    #[must_use]
    pub fn hasher(mut self, hasher: impl PathHasher + 'static) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    /// Report load progress to `observer`
    #[must_use]
    pub fn progress(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.progress = observer;
        self
    }

    /// Build all tables and return the handler
    pub fn open(self) -> Result<CascHandler> {
        let Self {
            config,
            decoder,
            hasher,
            progress,
        } = self;
        config.validate()?;

        let data_dir = config.data_dir();
        info!("Opening local storage at {}", data_dir.display());
        let local_index = LocalIndexTable::load(&data_dir, progress)?;
        let archives = ArchiveHandles::new(&data_dir);

        let encoding_gate =
            LocalCacheGate::new(config.encoding_cache_path(), config.encoding_content_key);
        let encoding_bytes = encoding_gate
            .open_or_extract(|| {
                read_bootstrap(
                    "encoding table",
                    &local_index,
                    &archives,
                    decoder.as_ref(),
                    &config.encoding_key,
                )
            })?
            .into_bytes();
        let encoding = EncodingTable::parse(&encoding_bytes, progress)?;
        drop(encoding_bytes);

        let root_key = root_bootstrap_key(&encoding, &config.root_content_key)?;
        let root_gate = LocalCacheGate::new(config.root_cache_path(), config.root_content_key);
        let root_bytes = root_gate
            .open_or_extract(|| {
                read_bootstrap(
                    "root table",
                    &local_index,
                    &archives,
                    decoder.as_ref(),
                    &root_key,
                )
            })?
            .into_bytes();
        let root = RootTable::parse(&root_bytes, progress)?;

        let handler = CascHandler {
            config,
            local_index,
            encoding,
            root,
            archives,
            decoder,
            hasher,
        };
        let stats = handler.stats();
        info!(
            "Storage ready: {} index entries, {} encodings, {} root paths",
            stats.local_index_entries, stats.encoding_entries, stats.root_paths
        );
        Ok(handler)
    }
}

/// Read-only view of a local installation
pub struct CascHandler {
    config: StorageConfig,
    local_index: LocalIndexTable,
    encoding: EncodingTable,
    root: RootTable,
    archives: ArchiveHandles,
    decoder: Box<dyn BlockDecoder>,
    hasher: Box<dyn PathHasher>,
}

impl std::fmt::Debug for CascHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascHandler")
            .field("base_path", &self.config.base_path)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CascHandler {
    /// Open with default decoder, hasher and no progress reporting
    pub fn open(config: StorageConfig) -> Result<Self> {
        HandlerBuilder::new(config).open()
    }

    /// Configure how the handler is opened
    pub fn builder<'a>(config: StorageConfig) -> HandlerBuilder<'a> {
        HandlerBuilder::new(config)
    }

    /// Configuration the handler was opened with
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Root table key of `path`
    pub fn path_hash(&self, path: &str) -> u64 {
        self.hasher.hash_path(path)
    }

    /// True when the root table knows `path` in any locale
    pub fn file_exists(&self, path: &str) -> bool {
        self.root.contains(self.path_hash(path))
    }

    /// Root entries for a path hash, in table order
    pub fn root_entries(&self, path_hash: u64) -> Option<&[RootEntry]> {
        self.root.get(path_hash)
    }

    /// Encoding entry of a content key
    pub fn resolve_content(&self, content_key: &ContentKey) -> Option<&EncodingEntry> {
        self.encoding.get(content_key)
    }

    /// Local index record of an encoded key
    pub fn local_index_entry(&self, key: &EncodingKey) -> Option<&IndexEntry> {
        self.local_index.lookup(key)
    }

    /// Encoded key that `path` resolves to for `locale`
    pub fn resolve_path(&self, path: &str, locale: LocaleFlags) -> Result<EncodingKey> {
        let entry = self.select_encoding(path, locale)?;
        entry
            .first_key()
            .copied()
            .ok_or_else(|| StorageError::NotFound(format!("{path}: encoding entry has no keys")))
    }

    /// Archive span `path` resolves to for `locale`, without reading it
    pub fn locate(&self, path: &str, locale: LocaleFlags) -> Result<ArchiveSpan> {
        let key = self.resolve_path(path, locale)?;
        self.span_of(&key)
    }

    /// Decoded content of `path` for `locale`
    pub fn open_file(&self, path: &str, locale: LocaleFlags) -> Result<Cursor<Vec<u8>>> {
        let key = self.resolve_path(path, locale)?;
        self.read_encoded(&key).map(Cursor::new)
    }

    /// Decoded content of `path`, also written to `destination`
    ///
    /// Parent directories of `destination` are created as needed.
    pub fn extract_to(
        &self,
        path: &str,
        destination: impl AsRef<Path>,
        locale: LocaleFlags,
    ) -> Result<Vec<u8>> {
        let bytes = self.open_file(path, locale)?.into_inner();
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(destination, &bytes)?;
        debug!("Extracted {path} to {}", destination.display());
        Ok(bytes)
    }

    /// Decoded content of a content key, bypassing the root table
    pub fn open_content(&self, content_key: &ContentKey) -> Result<Vec<u8>> {
        let key = self
            .resolve_content(content_key)
            .and_then(EncodingEntry::first_key)
            .ok_or_else(|| StorageError::NotFound(format!("content key {content_key}")))?;
        self.read_encoded(key)
    }

    /// Decoded content of an encoded key
    pub fn read_encoded(&self, key: &EncodingKey) -> Result<Vec<u8>> {
        read_key(&self.local_index, &self.archives, self.decoder.as_ref(), key)
    }

    /// Namespace builder over this handler's root table and hasher
    pub fn namespace(&self) -> NamespaceBuilder<'_> {
        NamespaceBuilder::new(&self.root, self.hasher.as_ref())
    }

    /// Table sizes and open archive count
    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            local_index_entries: self.local_index.len(),
            shard_files: self.local_index.shard_files().len(),
            encoding_entries: self.encoding.len(),
            root_paths: self.root.len(),
            root_entries: self.root.entry_count(),
            open_archives: self.archives.open_count(),
        }
    }

    /// The local index
    pub const fn local_index(&self) -> &LocalIndexTable {
        &self.local_index
    }

    /// The encoding table
    pub const fn encoding_table(&self) -> &EncodingTable {
        &self.encoding
    }

    /// The root table
    pub const fn root_table(&self) -> &RootTable {
        &self.root
    }

    /// Close every cached archive handle; later reads reopen lazily
    pub fn close_archives(&self) {
        self.archives.close_all();
    }

    /// First root entry for `locale` that has an encoding entry
    fn select_encoding(&self, path: &str, locale: LocaleFlags) -> Result<&EncodingEntry> {
        let entries = self
            .root
            .get(self.path_hash(path))
            .filter(|entries| !entries.is_empty())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;

        let mut locale_matched = false;
        for entry in entries.iter().filter(|e| e.locale().intersects(locale)) {
            locale_matched = true;
            if let Some(encoding) = self.encoding.get(&entry.content_key) {
                return Ok(encoding);
            }
            debug!(
                "{path}: content key {} ({}) has no encoding entry",
                entry.content_key,
                entry.locale()
            );
        }

        if locale_matched {
            Err(StorageError::NotFound(format!(
                "{path}: no encoding entry for locale {locale}"
            )))
        } else {
            Err(StorageError::UnsupportedLocale {
                path: path.to_string(),
                locale,
            })
        }
    }

    fn span_of(&self, key: &EncodingKey) -> Result<ArchiveSpan> {
        span_of(&self.local_index, key)
    }
}

fn archive_failure(key: &EncodingKey, source: ArchiveError) -> StorageError {
    StorageError::ArchiveAccess { key: *key, source }
}

fn span_of(local_index: &LocalIndexTable, key: &EncodingKey) -> Result<ArchiveSpan> {
    let Some(entry) = local_index.lookup(key) else {
        warn!("Encoded key {key} is not in the local index");
        return Err(archive_failure(key, ArchiveError::MissingLocalIndexEntry));
    };
    ArchiveSpan::from_entry(entry).map_err(|e| archive_failure(key, e))
}

fn read_key(
    local_index: &LocalIndexTable,
    archives: &ArchiveHandles,
    decoder: &dyn BlockDecoder,
    key: &EncodingKey,
) -> Result<Vec<u8>> {
    let span = span_of(local_index, key)?;
    archives
        .read_span(&span, decoder)
        .map_err(|e| archive_failure(key, e))
}

/// Extract a table the handler needs before it can resolve paths
fn read_bootstrap(
    what: &str,
    local_index: &LocalIndexTable,
    archives: &ArchiveHandles,
    decoder: &dyn BlockDecoder,
    key: &EncodingKey,
) -> Result<Vec<u8>> {
    debug!("Extracting {what} from encoded key {key}");
    read_key(local_index, archives, decoder, key).map_err(|e| match e {
        StorageError::ArchiveAccess {
            source: ArchiveError::MissingLocalIndexEntry,
            ..
        } => StorageError::MissingBootstrapEntry(format!(
            "{what}: encoded key {key} is not in the local index"
        )),
        other => other,
    })
}

/// Encoded key of the root table; exactly one is required
fn root_bootstrap_key(encoding: &EncodingTable, content_key: &ContentKey) -> Result<EncodingKey> {
    let entry = encoding.get(content_key).ok_or_else(|| {
        StorageError::MissingBootstrapEntry(format!(
            "root table: content key {content_key} has no encoding entry"
        ))
    })?;
    match entry.keys.as_slice() {
        [key] => Ok(*key),
        keys => Err(StorageError::MissingBootstrapEntry(format!(
            "root table: content key {content_key} has {} encoded keys, expected exactly one",
            keys.len()
        ))),
    }
}
