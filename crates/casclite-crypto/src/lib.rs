//! Hashing primitives for read-only CASC storage
//!
//! This crate provides the fixed-size key types and the path hash used to
//! join logical file names against the root table.
//!
//! # Components
//!
//! - **Keys**: [`ContentKey`], [`EncodingKey`] and [`TruncatedKey`] value types
//!   with structural equality, usable directly as map keys
//! - **Hashing**: MD5 for content keys, Jenkins96 (`hashlittle2`) for path hashes
//!
//! # Examples
//!
//! ## Content Key Generation
//!
//! ```
//! use casclite_crypto::md5::ContentKey;
//!
//! let content_key = ContentKey::from_data(b"Hello, World!");
//! assert_eq!(content_key.to_hex(), "65a8e27d8879283831b664bd8b7f0ad4");
//! ```
//!
//! ## Path Hashing
//!
//! ```
//! use casclite_crypto::jenkins::{JenkinsPathHasher, PathHasher};
//!
//! let hasher = JenkinsPathHasher;
//! assert_eq!(
//!     hasher.hash_path("DBFilesClient/Map.dbc"),
//!     hasher.hash_path("dbfilesclient\\map.dbc"),
//! );
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod jenkins;
pub mod md5;

pub use error::CryptoError;

// Re-export commonly used types
pub use jenkins::{Jenkins96, JenkinsPathHasher, PathHasher, hash_path, hashlittle2};
pub use md5::{ContentKey, EncodingKey, TRUNCATED_KEY_LEN, TruncatedKey};
