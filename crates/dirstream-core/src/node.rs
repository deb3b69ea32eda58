//! Directory and file node types.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A regular (non-directory) entry inside a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name (not full path).
    pub name: CompactString,
    /// Size in bytes.
    pub size: u64,
}

impl FileEntry {
    /// Create a new file entry.
    pub fn new(name: impl Into<CompactString>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Load status of a directory node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum LoadState {
    /// Contents have not been enumerated.
    #[default]
    Unloaded,
    /// A task holds the right to enumerate this node.
    Loading,
    /// Files and subdirectory placeholders are present.
    Loaded,
}

/// One directory in the live tree.
///
/// Unexpanded directories are *placeholders*: `size == 0`, no contents,
/// [`LoadState::Unloaded`]. The cached `file_count` / `subdir_count` may still
/// be meaningful for a placeholder so it can report "N items" before expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Unique key of this node within the tree.
    pub path: PathBuf,

    /// Aggregate size of direct files plus every child's `size`.
    pub size: u64,

    /// Direct file entries, unique by name.
    pub files: Vec<FileEntry>,

    /// Child directories, unique by path.
    pub subdirs: Vec<DirectoryNode>,

    /// Load status.
    pub load_state: LoadState,

    /// Number of direct files.
    pub file_count: usize,

    /// Number of direct subdirectories.
    pub subdir_count: usize,
}

impl DirectoryNode {
    /// Create an unexpanded placeholder for a path.
    pub fn placeholder(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            files: Vec::new(),
            subdirs: Vec::new(),
            load_state: LoadState::Unloaded,
            file_count: 0,
            subdir_count: 0,
        }
    }

    /// Create a loaded node from a directory listing.
    ///
    /// `subdirs` are expected to be placeholders; the size covers whatever
    /// they already hold.
    pub fn loaded(path: impl Into<PathBuf>, files: Vec<FileEntry>, subdirs: Vec<DirectoryNode>) -> Self {
        let mut node = Self {
            path: path.into(),
            size: 0,
            file_count: files.len(),
            subdir_count: subdirs.len(),
            files,
            subdirs,
            load_state: LoadState::Loaded,
        };
        node.size = node.direct_bytes() + node.subdirs.iter().map(|d| d.size).sum::<u64>();
        node
    }

    /// Last path segment, or the whole path for roots like `/`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// Check if contents have been enumerated.
    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    /// Check if a task is currently enumerating this node.
    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    /// Try to take the right to scan this node.
    ///
    /// Returns `false` if the node is already loading or loaded.
    pub fn begin_loading(&mut self) -> bool {
        if self.load_state != LoadState::Unloaded {
            return false;
        }
        self.load_state = LoadState::Loading;
        true
    }

    /// Leave the loading state: `Loaded` on success, `Unloaded` otherwise.
    pub fn finish_loading(&mut self, success: bool) {
        self.load_state = if success {
            LoadState::Loaded
        } else {
            LoadState::Unloaded
        };
    }

    /// Sum of direct file sizes.
    pub fn direct_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Get the number of direct children (files and directories).
    pub fn child_count(&self) -> usize {
        self.file_count + self.subdir_count
    }

    /// Find a node by exact path in this subtree (depth-first).
    ///
    /// Only descends into children whose path is a component prefix of
    /// `path`.
    pub fn find(&self, path: &Path) -> Option<&DirectoryNode> {
        if self.path == path {
            return Some(self);
        }
        self.subdirs
            .iter()
            .filter(|child| path.starts_with(&child.path))
            .find_map(|child| child.find(path))
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, path: &Path) -> Option<&mut DirectoryNode> {
        if self.path == path {
            return Some(self);
        }
        self.subdirs
            .iter_mut()
            .filter(|child| path.starts_with(&child.path))
            .find_map(|child| child.find_mut(path))
    }

    /// Recompute `size` bottom-up for this whole subtree and return it.
    pub fn recompute_size(&mut self) -> u64 {
        let children: u64 = self.subdirs.iter_mut().map(|d| d.recompute_size()).sum();
        self.size = self.direct_bytes() + children;
        self.size
    }

    /// Check the size invariant on every node of this subtree.
    pub fn size_invariant_holds(&self) -> bool {
        let children: u64 = self.subdirs.iter().map(|d| d.size).sum();
        self.size == self.direct_bytes() + children
            && self.subdirs.iter().all(|d| d.size_invariant_holds())
    }

    /// Refresh the cached counts from the enumerated contents.
    pub fn update_counts(&mut self) {
        self.file_count = self.files.len();
        self.subdir_count = self.subdirs.len();
    }

    /// Rewrite the paths of this node and all descendants from `from` to `to`.
    pub(crate) fn reroot(&mut self, from: &Path, to: &Path) {
        if let Ok(rest) = self.path.strip_prefix(from) {
            self.path = if rest.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(rest)
            };
        }
        for child in &mut self.subdirs {
            child.reroot(from, to);
        }
    }

    /// Sort files and subdirectories by size in descending order, recursively.
    pub fn sort_by_size(&mut self) {
        self.files.sort_by(|a, b| b.size.cmp(&a.size));
        self.subdirs.sort_by(|a, b| b.size.cmp(&a.size));
        for child in &mut self.subdirs {
            child.sort_by_size();
        }
    }

    /// Visit every node of this subtree, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a DirectoryNode)) {
        visit(self);
        for child in &self.subdirs {
            child.walk(visit);
        }
    }
}
