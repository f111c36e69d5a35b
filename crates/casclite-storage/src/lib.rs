//! Read-only local CASC storage for game client installations.
//!
//! This crate resolves logical file paths to byte ranges inside the flat
//! `data.NNN` archives of a local installation. Resolution walks three
//! hash-keyed tables, all built once when the handler opens:
//!
//! - **Local index** (`.idx` shard files): truncated encoded key -> archive location
//! - **Encoding table**: content key -> encoded keys
//! - **Root table**: path hash -> content key per locale
//!
//! The encoding and root tables are themselves stored in the archives, so
//! opening a handler bootstraps them through the local index, reusing
//! decoded copies cached on disk when their content hash still matches.
//!
//! # Example
//!
//! ```no_run
//! use casclite_storage::{CascHandler, LocaleFlags, StorageConfig};
//!
//! # fn example(config: StorageConfig) -> casclite_storage::Result<()> {
//! let handler = CascHandler::open(config)?;
//! if handler.file_exists("DBFilesClient\\Map.dbc") {
//!     let bytes = handler.extract_to(
//!         "DBFilesClient\\Map.dbc",
//!         "out/Map.dbc",
//!         LocaleFlags::ENUS,
//!     )?;
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use casclite_crypto::EncodingKey;
use std::path::PathBuf;
use thiserror::Error;

// Data archive handles and record access
pub mod archive;

// Local file copies of bootstrap tables
pub mod cache_gate;

// Configuration
pub mod config;

// Block-transform decoder seam
pub mod decoder;

// Encoding table (content key -> encoded keys)
pub mod encoding;

// Resolution pipeline
pub mod handler;

// Local shard index (.idx)
pub mod index;

// Locale bitmask
pub mod locale;

// Browsable tree built from a list file
pub mod namespace;

// Load progress notifications
pub mod progress;

// Root table (path hash -> content key)
pub mod root;

pub use archive::{ArchiveHandles, ArchiveSpan};
pub use cache_gate::{CacheLookup, LocalCacheGate};
pub use config::StorageConfig;
pub use decoder::{BlockDecoder, PassthroughDecoder};
pub use encoding::{EncodingEntry, EncodingTable};
pub use handler::{CascHandler, HandlerBuilder, HandlerStats};
pub use index::{ArchiveLocation, IndexEntry, LocalIndexTable};
pub use locale::LocaleFlags;
pub use namespace::{FileNode, Folder, NameRegistry, NamespaceBuilder, NamespaceNode};
pub use progress::{LoadPhase, NoProgress, ProgressObserver};
pub use root::{RootBlock, RootEntry, RootTable};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while building tables or resolving content.
///
/// Resolution failures use distinct kinds so callers can tell a path that
/// does not exist ([`StorageError::NotFound`]) from one whose storage is
/// broken ([`StorageError::ArchiveAccess`]).
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No `.idx` shard file was found for any shard.
    #[error("No index files found in {}", .0.display())]
    MissingIndexFiles(PathBuf),

    /// Shard index file is malformed.
    #[error("Index error: {0}")]
    Index(String),

    /// Encoding or root stream is malformed.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A root block declared an empty locale mask.
    #[error("Corrupt root block at offset {offset}: locale flags are empty")]
    CorruptRootBlock {
        /// Stream offset of the block header
        offset: u64,
    },

    /// A table needed to build the other tables could not be located.
    #[error("Bootstrap entry unavailable: {0}")]
    MissingBootstrapEntry(String),

    /// Path or content is not known to the root or encoding table.
    #[error("Content not found: {0}")]
    NotFound(String),

    /// The path exists, but no variant applies to the requested locale.
    #[error("No variant of {path} for locale {locale}")]
    UnsupportedLocale {
        /// Requested path
        path: String,
        /// Requested locale mask
        locale: LocaleFlags,
    },

    /// Reading or decoding an encoded key from the archives failed.
    #[error("Archive access failed for {key}: {source}")]
    ArchiveAccess {
        /// Encoded key being read
        key: EncodingKey,
        /// Underlying failure
        #[source]
        source: ArchiveError,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True when the asset is unknown, as opposed to known but unreadable.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnsupportedLocale { .. })
    }
}

/// Failure while turning an encoded key into decoded bytes.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The truncated key is absent from every local shard index.
    #[error("no local index entry")]
    MissingLocalIndexEntry,

    /// The indexed record cannot hold the local record header.
    #[error("record of {size} bytes is shorter than its 30-byte header")]
    RecordTooShort {
        /// Indexed record size
        size: u32,
    },

    /// Opening, seeking or reading an archive failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The block-transform decoder rejected the record.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default data directory name (installation root).
pub const DEFAULT_DATA_DIR: &str = "Data";

/// Data subdirectory where both `.idx` and `.data` files live.
pub const DATA_DIR: &str = "data";

/// File name of the cached decoded encoding table.
pub const ENCODING_CACHE_FILE: &str = "encoding";

/// File name of the cached decoded root table.
pub const ROOT_CACHE_FILE: &str = "root";
