//! Synthetic local installations for integration tests
//!
//! Every record is stored verbatim behind a zeroed 30-byte header, so the
//! passthrough decoder returns the original bytes.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use casclite_crypto::{ContentKey, EncodingKey, hash_path};
use casclite_storage::{ArchiveLocation, LocaleFlags, StorageConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HEADER: usize = 30;

/// One root entry to lay down
#[derive(Clone)]
pub struct FileSpec {
    pub path: String,
    pub locale: LocaleFlags,
    pub content: Vec<u8>,
    /// Add the content to the encoding table
    pub encoded: bool,
    /// Add the encoded key to the local index
    pub indexed: bool,
}

/// Builder for an installation directory
#[derive(Default)]
pub struct InstallBuilder {
    files: Vec<FileSpec>,
    ambiguous_root: bool,
    shadow_shard: bool,
}

/// A laid-down installation and the config that opens it
pub struct Installation {
    pub dir: TempDir,
    pub config: StorageConfig,
    /// Offset and record size of each file, in builder order
    pub records: Vec<(u32, u32)>,
}

impl Installation {
    pub fn data_dir(&self) -> PathBuf {
        self.config.data_dir()
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir().join("data.000")
    }
}

pub fn encoded_key_for(content: &[u8]) -> EncodingKey {
    let mut seed = b"encoded:".to_vec();
    seed.extend_from_slice(content);
    EncodingKey::from_data(&seed)
}

impl InstallBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolvable file
    pub fn file(mut self, path: &str, locale: LocaleFlags, content: &[u8]) -> Self {
        self.files.push(FileSpec {
            path: path.to_string(),
            locale,
            content: content.to_vec(),
            encoded: true,
            indexed: true,
        });
        self
    }

    /// A root entry whose content key is missing from the encoding table
    pub fn unencoded(mut self, path: &str, locale: LocaleFlags, content: &[u8]) -> Self {
        self.files.push(FileSpec {
            path: path.to_string(),
            locale,
            content: content.to_vec(),
            encoded: false,
            indexed: true,
        });
        self
    }

    /// A file whose encoded key is missing from the local index
    pub fn unindexed(mut self, path: &str, locale: LocaleFlags, content: &[u8]) -> Self {
        self.files.push(FileSpec {
            path: path.to_string(),
            locale,
            content: content.to_vec(),
            encoded: true,
            indexed: false,
        });
        self
    }

    /// Give the root table a second encoded key
    pub fn ambiguous_root(mut self) -> Self {
        self.ambiguous_root = true;
        self
    }

    /// Add a later shard repeating every key with a bogus location
    pub fn shadow_shard(mut self) -> Self {
        self.shadow_shard = true;
        self
    }

    pub fn build(self) -> Installation {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("Data").join("data");
        std::fs::create_dir_all(&data_dir).unwrap();

        let mut archive = Vec::new();
        let mut index: Vec<([u8; 9], ArchiveLocation, u32)> = Vec::new();
        let mut encoding: Vec<(ContentKey, Vec<EncodingKey>, usize)> = Vec::new();
        let mut records = Vec::new();

        for spec in &self.files {
            let ekey = encoded_key_for(&spec.content);
            let (offset, size) = store(&mut archive, &spec.content);
            records.push((offset, size));
            if spec.indexed {
                index.push((key9(&ekey), location(offset), size));
            }
            if spec.encoded {
                encoding.push((
                    ContentKey::from_data(&spec.content),
                    vec![ekey],
                    spec.content.len(),
                ));
            }
        }

        let root = root_bytes(&self.files);
        let root_ckey = ContentKey::from_data(&root);
        let root_ekey = encoded_key_for(&root);
        let (offset, size) = store(&mut archive, &root);
        index.push((key9(&root_ekey), location(offset), size));
        let mut root_keys = vec![root_ekey];
        if self.ambiguous_root {
            root_keys.push(EncodingKey::from_bytes([0xEE; 16]));
        }
        encoding.push((root_ckey, root_keys, root.len()));

        let encoding = encoding_bytes(&encoding);
        let encoding_ckey = ContentKey::from_data(&encoding);
        let encoding_ekey = encoded_key_for(&encoding);
        let (offset, size) = store(&mut archive, &encoding);
        index.push((key9(&encoding_ekey), location(offset), size));

        std::fs::write(data_dir.join("data.000"), &archive).unwrap();
        // An older generation of shard 0 that must be ignored
        std::fs::write(data_dir.join("0000000001.idx"), b"stale").unwrap();
        std::fs::write(data_dir.join("0000000002.idx"), shard_bytes(&index)).unwrap();
        if self.shadow_shard {
            let bogus: Vec<_> = index
                .iter()
                .map(|(key, _, _)| (*key, location(0x0FFF_0000), 0x7FFF))
                .collect();
            std::fs::write(data_dir.join("0100000001.idx"), shard_bytes(&bogus)).unwrap();
        }

        let config = StorageConfig::new(dir.path(), encoding_ekey, encoding_ckey, root_ckey);
        Installation {
            dir,
            config,
            records,
        }
    }
}

/// Append a record and return its offset and size
fn store(archive: &mut Vec<u8>, bytes: &[u8]) -> (u32, u32) {
    let offset = archive.len() as u32;
    archive.extend_from_slice(&[0u8; HEADER]);
    archive.extend_from_slice(bytes);
    (offset, (HEADER + bytes.len()) as u32)
}

fn key9(key: &EncodingKey) -> [u8; 9] {
    *key.truncated().as_bytes()
}

fn location(offset: u32) -> ArchiveLocation {
    ArchiveLocation {
        archive_id: 0,
        archive_offset: offset,
    }
}

/// Shard index file with a 16-byte header
pub fn shard_bytes(blocks: &[([u8; 9], ArchiveLocation, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&[0x07, 0x00, 0x00, 0x00, 0x04, 0x05, 0x09, 0x1E]);
    out.extend_from_slice(&[0u8; 8]);
    out.resize(32, 0);
    out.extend_from_slice(&((blocks.len() * 18) as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for (key, location, size) in blocks {
        out.extend_from_slice(key);
        out.extend_from_slice(&location.to_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    let padded = out.len().div_ceil(4096) * 4096;
    out.resize(padded, 0);
    out
}

/// Encoding table with one content-key page
pub fn encoding_bytes(entries: &[(ContentKey, Vec<EncodingKey>, usize)]) -> Vec<u8> {
    let mut out = b"EN".to_vec();
    out.extend_from_slice(&[1, 16, 16]);
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&1i32.to_be_bytes());
    out.extend_from_slice(&0i32.to_be_bytes());
    out.push(0);
    let strings = b"n\0z\0";
    out.extend_from_slice(&(strings.len() as i32).to_be_bytes());
    out.extend_from_slice(strings);
    out.extend_from_slice(&[0x5A; 32]);

    for (ckey, ekeys, size) in entries {
        out.extend_from_slice(&(ekeys.len() as u16).to_le_bytes());
        out.extend_from_slice(&(*size as i32).to_be_bytes());
        out.extend_from_slice(ckey.as_bytes());
        for ekey in ekeys {
            out.extend_from_slice(ekey.as_bytes());
        }
    }
    out.extend_from_slice(&[0, 0]);
    out.resize(out.len() + 64, 0);
    out
}

/// Root table with one block per file
pub fn root_bytes(files: &[FileSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    for spec in files {
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&spec.locale.bits().to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(ContentKey::from_data(&spec.content).as_bytes());
        out.extend_from_slice(&hash_path(&spec.path).to_le_bytes());
    }
    out
}

pub fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
