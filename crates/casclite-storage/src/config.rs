//! Configuration for the storage system

use crate::{DATA_DIR, DEFAULT_DATA_DIR, ENCODING_CACHE_FILE, ROOT_CACHE_FILE, Result, StorageError};
use casclite_crypto::{ContentKey, EncodingKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for opening a local installation
///
/// The encoding table is bootstrapped straight from its encoded key, so
/// both of its keys come from the build configuration. The root table is
/// found through the encoding table and only needs its content key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Installation root (the directory containing `Data/`)
    pub base_path: PathBuf,

    /// Directory for decoded copies of the encoding and root tables
    pub cache_dir: PathBuf,

    /// Encoded key of the encoding table
    #[serde(with = "hex_key")]
    pub encoding_key: EncodingKey,

    /// Content key of the decoded encoding table
    #[serde(with = "hex_key")]
    pub encoding_content_key: ContentKey,

    /// Content key of the decoded root table
    #[serde(with = "hex_key")]
    pub root_content_key: ContentKey,
}

impl StorageConfig {
    /// Create a configuration with the cache directory under `base_path`
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        encoding_key: EncodingKey,
        encoding_content_key: ContentKey,
        root_content_key: ContentKey,
    ) -> Self {
        let base_path = base_path.as_ref().to_path_buf();
        Self {
            cache_dir: base_path.join("cache"),
            base_path,
            encoding_key,
            encoding_content_key,
            root_content_key,
        }
    }

    /// Set the installation root
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.base_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the directory for decoded bootstrap copies
    #[must_use]
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the encoding table's encoded and content keys
    #[must_use]
    pub const fn with_encoding(
        mut self,
        encoding_key: EncodingKey,
        content_key: ContentKey,
    ) -> Self {
        self.encoding_key = encoding_key;
        self.encoding_content_key = content_key;
        self
    }

    /// Set the root table's content key
    #[must_use]
    pub const fn with_root(mut self, content_key: ContentKey) -> Self {
        self.root_content_key = content_key;
        self
    }

    /// Directory holding both `.idx` shard files and `data.NNN` archives
    pub fn data_dir(&self) -> PathBuf {
        self.base_path.join(DEFAULT_DATA_DIR).join(DATA_DIR)
    }

    /// Fixed path of the decoded encoding table copy
    pub fn encoding_cache_path(&self) -> PathBuf {
        self.cache_dir.join(ENCODING_CACHE_FILE)
    }

    /// Fixed path of the decoded root table copy
    pub fn root_cache_path(&self) -> PathBuf {
        self.cache_dir.join(ROOT_CACHE_FILE)
    }

    /// Reject configurations that cannot describe an installation
    pub fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(StorageError::Config("base path is empty".to_string()));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(StorageError::Config("cache directory is empty".to_string()));
        }
        Ok(())
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StorageError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Config(format!("cannot serialize configuration: {e}")))
    }
}

/// Keys are stored as lowercase hex strings
mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<S, K>(key: &K, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Display,
    {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D, K>(deserializer: D) -> Result<K, D::Error>
    where
        D: Deserializer<'de>,
        K: FromStr,
        K::Err: Display,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}
