//! Live directory tree and its mutations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::node::DirectoryNode;

/// Summary statistics for the current state of a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSummary {
    /// Total size in bytes.
    pub total_size: u64,
    /// Directories whose contents are enumerated.
    pub dirs_loaded: u64,
    /// Directories still waiting for their contents.
    pub dirs_pending: u64,
    /// Files enumerated so far.
    pub files: u64,
}

/// Directory tree owned by a single writer.
///
/// Besides the nodes themselves the tree keeps a path-keyed side table of
/// expanded directories for presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirTree {
    /// Root node of the tree.
    pub root: DirectoryNode,

    expanded: HashSet<PathBuf>,
}

impl DirTree {
    /// Create a tree whose root is an unexpanded placeholder.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self::from_root(DirectoryNode::placeholder(root_path))
    }

    /// Create a tree from a pre-populated root, re-establishing sizes bottom-up.
    pub fn from_root(mut root: DirectoryNode) -> Self {
        root.recompute_size();
        Self {
            root,
            expanded: HashSet::new(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.size
    }

    /// Find a directory by exact path.
    pub fn find_node(&self, path: &Path) -> Option<&DirectoryNode> {
        self.root.find(path)
    }

    /// Find a directory by exact path for in-place mutation.
    ///
    /// Callers that change a node's size must correct its ancestors
    /// themselves; prefer [`DirTree::replace_subtree`].
    pub fn find_node_mut(&mut self, path: &Path) -> Option<&mut DirectoryNode> {
        self.root.find_mut(path)
    }

    /// Index chain from the root to the directory at `path`.
    pub(crate) fn locate(&self, path: &Path) -> Option<Vec<usize>> {
        fn descend(node: &DirectoryNode, path: &Path, chain: &mut Vec<usize>) -> bool {
            if node.path == path {
                return true;
            }
            for (i, child) in node.subdirs.iter().enumerate() {
                if path.starts_with(&child.path) {
                    chain.push(i);
                    if descend(child, path, chain) {
                        return true;
                    }
                    chain.pop();
                }
            }
            false
        }

        let mut chain = Vec::new();
        descend(&self.root, path, &mut chain).then_some(chain)
    }

    pub(crate) fn node_at_mut(&mut self, chain: &[usize]) -> &mut DirectoryNode {
        chain
            .iter()
            .fold(&mut self.root, |node, &i| &mut node.subdirs[i])
    }

    /// Replace `removed` bytes with `added` bytes on every node of `chain`,
    /// root included.
    pub(crate) fn adjust_sizes(&mut self, chain: &[usize], removed: u64, added: u64) {
        let mut node = &mut self.root;
        node.size = node.size.saturating_sub(removed) + added;
        for &i in chain {
            node = &mut node.subdirs[i];
            node.size = node.size.saturating_sub(removed) + added;
        }
    }

    /// Swap the directory at `path` for `replacement` and correct every
    /// ancestor's size.
    ///
    /// Returns the size of the node that was replaced.
    pub fn replace_subtree(
        &mut self,
        path: &Path,
        replacement: DirectoryNode,
    ) -> Result<u64, TreeError> {
        let chain = self.locate(path).ok_or_else(|| TreeError::NotFound {
            path: path.to_path_buf(),
        })?;
        let added = replacement.size;
        let slot = self.node_at_mut(&chain);
        let removed = slot.size;
        *slot = replacement;

        if let Some((_, ancestors)) = chain.split_last() {
            self.adjust_sizes(ancestors, removed, added);
        }
        Ok(removed)
    }

    /// Remove a directory or file from the tree.
    ///
    /// The removed size is subtracted from every ancestor. Returns the number
    /// of bytes removed.
    pub fn remove_node(&mut self, path: &Path) -> Result<u64, TreeError> {
        if path == self.root.path {
            return Err(TreeError::RootRemoval {
                path: path.to_path_buf(),
            });
        }
        let not_found = || TreeError::NotFound {
            path: path.to_path_buf(),
        };

        let parent_path = path.parent().ok_or_else(not_found)?;
        let chain = self.locate(parent_path).ok_or_else(not_found)?;
        let parent = self.node_at_mut(&chain);

        let removed = if let Some(idx) = parent.subdirs.iter().position(|d| d.path == path) {
            parent.subdirs.remove(idx).size
        } else {
            let name = path.file_name().ok_or_else(not_found)?;
            let idx = parent
                .files
                .iter()
                .position(|f| f.name.as_str() == name.to_string_lossy())
                .ok_or_else(not_found)?;
            parent.files.remove(idx).size
        };
        parent.update_counts();

        self.adjust_sizes(&chain, removed, 0);
        self.expanded.retain(|p| !p.starts_with(path));
        Ok(removed)
    }

    /// Rename a directory or file in place.
    ///
    /// The new path must share the old path's parent. Directory renames
    /// re-root every descendant path and re-key the expansion table. Sizes are
    /// unchanged.
    pub fn rename_node(&mut self, old: &Path, new: &Path) -> Result<(), TreeError> {
        if old.parent() != new.parent() {
            return Err(TreeError::CrossDirectoryRename {
                from: old.to_path_buf(),
                to: new.to_path_buf(),
            });
        }
        if old == new {
            return Ok(());
        }

        if old == self.root.path {
            self.root.reroot(old, new);
        } else {
            let not_found = || TreeError::NotFound {
                path: old.to_path_buf(),
            };
            let parent_path = old.parent().ok_or_else(not_found)?;
            let chain = self.locate(parent_path).ok_or_else(not_found)?;
            let parent = self.node_at_mut(&chain);

            let new_name = new.file_name().map(|n| n.to_string_lossy().into_owned());
            let clashes = parent.subdirs.iter().any(|d| d.path == new)
                || parent
                    .files
                    .iter()
                    .any(|f| Some(f.name.as_str()) == new_name.as_deref());
            if clashes {
                return Err(TreeError::AlreadyExists {
                    path: new.to_path_buf(),
                });
            }

            if let Some(dir) = parent.subdirs.iter_mut().find(|d| d.path == old) {
                dir.reroot(old, new);
            } else {
                let old_name = old.file_name().ok_or_else(not_found)?.to_string_lossy();
                let file = parent
                    .files
                    .iter_mut()
                    .find(|f| f.name.as_str() == old_name)
                    .ok_or_else(not_found)?;
                file.name = new_name.ok_or_else(not_found)?.into();
                return Ok(());
            }
        }

        self.rekey_expanded(old, new);
        Ok(())
    }

    fn rekey_expanded(&mut self, old: &Path, new: &Path) {
        let moved: Vec<PathBuf> = self
            .expanded
            .iter()
            .filter(|p| p.starts_with(old))
            .cloned()
            .collect();
        for path in moved {
            self.expanded.remove(&path);
            let rest = path.strip_prefix(old).unwrap_or(Path::new(""));
            let rekeyed = if rest.as_os_str().is_empty() {
                new.to_path_buf()
            } else {
                new.join(rest)
            };
            self.expanded.insert(rekeyed);
        }
    }

    /// Record whether a directory is expanded in a presentation layer.
    pub fn set_expanded(&mut self, path: impl Into<PathBuf>, expanded: bool) {
        let path = path.into();
        if expanded {
            self.expanded.insert(path);
        } else {
            self.expanded.remove(&path);
        }
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.expanded.contains(path)
    }

    /// Compute summary statistics over the whole tree.
    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary {
            total_size: self.root.size,
            ..Default::default()
        };
        self.root.walk(&mut |node| {
            if node.is_loaded() {
                summary.dirs_loaded += 1;
            } else {
                summary.dirs_pending += 1;
            }
            summary.files += node.files.len() as u64;
        });
        summary
    }
}
