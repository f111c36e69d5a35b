//! Browsable folder tree built from a list of known paths
//!
//! The root table only stores path hashes, so names have to come from an
//! outside list file. Paths missing from the root table are skipped. The
//! tree is keyed by hash; human-readable names live in a separate
//! [`NameRegistry`] used for display only.

use crate::root::RootTable;
use casclite_crypto::PathHasher;
use std::collections::HashMap;
use tracing::{info, warn};

/// Display names for folder and file hashes
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    folders: HashMap<u64, String>,
    files: HashMap<u64, String>,
}

impl NameRegistry {
    /// Name of a folder hash
    pub fn folder_name(&self, hash: u64) -> Option<&str> {
        self.folders.get(&hash).map(String::as_str)
    }

    /// Full path of a file hash
    pub fn file_name(&self, hash: u64) -> Option<&str> {
        self.files.get(&hash).map(String::as_str)
    }

    /// Number of named folders, including the root
    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Number of named files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Forget every name
    pub fn reset(&mut self) {
        self.folders.clear();
        self.files.clear();
    }
}

/// Folder node keyed by the hash of its own name segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    hash: u64,
    children: HashMap<u64, NamespaceNode>,
}

impl Folder {
    fn new(hash: u64) -> Self {
        Self {
            hash,
            children: HashMap::new(),
        }
    }

    /// Hash of the folder's name segment
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    /// Child by hash
    pub fn get(&self, hash: u64) -> Option<&NamespaceNode> {
        self.children.get(&hash)
    }

    /// Direct children in arbitrary order
    pub fn children(&self) -> impl Iterator<Item = &NamespaceNode> {
        self.children.values()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when the folder has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Files anywhere below this folder
    pub fn file_count(&self) -> usize {
        self.children
            .values()
            .map(|node| match node {
                NamespaceNode::File(_) => 1,
                NamespaceNode::Folder(folder) => folder.file_count(),
            })
            .sum()
    }

    /// Folders anywhere below this folder, not counting itself
    pub fn folder_count(&self) -> usize {
        self.children
            .values()
            .map(|node| match node {
                NamespaceNode::File(_) => 0,
                NamespaceNode::Folder(folder) => 1 + folder.folder_count(),
            })
            .sum()
    }
}

/// Leaf node keyed by the hash of the full path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNode {
    /// Root table key of the file
    pub hash: u64,
}

/// Entry in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceNode {
    /// Folder with children
    Folder(Folder),
    /// File leaf
    File(FileNode),
}

impl NamespaceNode {
    /// Hash the node is keyed by
    pub const fn hash(&self) -> u64 {
        match self {
            Self::Folder(folder) => folder.hash,
            Self::File(file) => file.hash,
        }
    }

    /// The folder, if this node is one
    pub const fn as_folder(&self) -> Option<&Folder> {
        match self {
            Self::Folder(folder) => Some(folder),
            Self::File(_) => None,
        }
    }

    /// True for file leaves
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Builds a [`Folder`] tree from path strings
pub struct NamespaceBuilder<'a> {
    root: &'a RootTable,
    hasher: &'a dyn PathHasher,
    names: NameRegistry,
}

impl<'a> NamespaceBuilder<'a> {
    /// Builder over a root table and the hasher its keys were made with
    pub fn new(root: &'a RootTable, hasher: &'a dyn PathHasher) -> Self {
        Self {
            root,
            hasher,
            names: NameRegistry::default(),
        }
    }

    /// Build a tree from `paths`
    ///
    /// Segments are split on `\` and `/`. Intermediate folders are keyed by
    /// the hash of their own segment, files by the hash of the full path.
    /// When a segment names an existing file, the rest of the path is
    /// ignored.
    pub fn build<I, S>(&mut self, paths: I) -> Folder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root_hash = self.hasher.hash_path("root");
        self.names.folders.insert(root_hash, "root".to_string());
        let mut tree = Folder::new(root_hash);

        for path in paths {
            let path = path.as_ref();
            let file_hash = self.hasher.hash_path(path);
            if !self.root.contains(file_hash) {
                warn!("Skipping unknown file name: {path}");
                continue;
            }
            self.insert(&mut tree, path, file_hash);
        }

        info!("Namespace holds {} files", self.names.file_count());
        tree
    }

    fn insert(&mut self, tree: &mut Folder, path: &str, file_hash: u64) {
        let segments: Vec<&str> = path.split(['\\', '/']).filter(|s| !s.is_empty()).collect();
        let Some((_, folders)) = segments.split_last() else {
            return;
        };

        let mut folder = tree;
        for segment in folders {
            let hash = self.hasher.hash_path(segment);
            let node = folder.children.entry(hash).or_insert_with(|| {
                self.names.folders.insert(hash, (*segment).to_string());
                NamespaceNode::Folder(Folder::new(hash))
            });
            match node {
                NamespaceNode::Folder(next) => folder = next,
                NamespaceNode::File(_) => return,
            }
        }

        if !folder.children.contains_key(&file_hash) {
            folder
                .children
                .insert(file_hash, NamespaceNode::File(FileNode { hash: file_hash }));
            self.names.files.insert(file_hash, path.to_string());
        }
    }

    /// Names recorded so far
    pub const fn names(&self) -> &NameRegistry {
        &self.names
    }

    /// Consume the builder, keeping its names
    pub fn into_names(self) -> NameRegistry {
        self.names
    }

    /// Forget every recorded name
    pub fn reset(&mut self) {
        self.names.reset();
    }
}
