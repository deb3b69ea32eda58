//! Single-level directory listing and lazy expansion.

use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use dirstream_core::{
    DirTree, DirectoryNode, FileEntry, ReadError, ScanConfig, StreamUpdate, TreeError,
};

/// Errors from expanding a directory that lives in a tree.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// The directory itself could not be read.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The path does not name a directory in the tree.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// List the immediate entries of one directory.
///
/// Files are recorded with their byte size; entries whose metadata cannot be
/// read are skipped. Subdirectories become unexpanded placeholders. Only a
/// failure to list `path` itself is an error.
pub fn scan_directory(path: &Path, config: &ScanConfig) -> Result<StreamUpdate, ReadError> {
    scan_directory_until(path, config, &|| false)
}

/// Like [`scan_directory`], but stops iterating once `stop` returns true.
///
/// A stopped listing is partial; callers discard it.
pub(crate) fn scan_directory_until(
    path: &Path,
    config: &ScanConfig,
    stop: &dyn Fn() -> bool,
) -> Result<StreamUpdate, ReadError> {
    let start = Instant::now();
    let entries = std::fs::read_dir(path).map_err(|e| ReadError::io(path, e))?;

    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries {
        if stop() {
            break;
        }
        let Ok(entry) = entry else {
            continue;
        };

        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if config.should_skip(&name) {
            continue;
        }

        // `file_type` does not follow symlinks, so linked directories are
        // sized as plain entries and never traversed.
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push(DirectoryNode::placeholder(entry.path()));
        } else if let Ok(metadata) = entry.metadata() {
            files.push(FileEntry::new(name.as_ref(), metadata.len()));
        }
    }

    let snapshot = DirectoryNode::loaded(path, files, subdirs);
    Ok(StreamUpdate::from_snapshot(snapshot, start.elapsed()))
}

/// Fill an unexpanded node in place with a blocking single-level scan.
///
/// Does nothing if the node is already loaded or being loaded. On failure the
/// node returns to the unloaded state so it can be retried later.
pub fn load_directory_contents(
    node: &mut DirectoryNode,
    config: &ScanConfig,
) -> Result<(), ReadError> {
    if !node.begin_loading() {
        return Ok(());
    }

    match scan_directory(&node.path, config) {
        Ok(update) => {
            let snapshot = update.snapshot;
            node.files = snapshot.files;
            node.subdirs = snapshot.subdirs;
            node.file_count = snapshot.file_count;
            node.subdir_count = snapshot.subdir_count;
            node.size = snapshot.size;
            node.finish_loading(true);
            Ok(())
        }
        Err(err) => {
            node.finish_loading(false);
            Err(err)
        }
    }
}

/// Expand the directory at `path` inside `tree`, correcting ancestor sizes.
///
/// Returns the number of bytes the expansion added (0 if the directory was
/// already loaded or loading).
pub fn expand_in_tree(
    tree: &mut DirTree,
    path: &Path,
    config: &ScanConfig,
) -> Result<u64, ExpandError> {
    let node = tree.find_node(path).ok_or_else(|| TreeError::NotFound {
        path: path.to_path_buf(),
    })?;
    if node.is_loaded() || node.is_loading() {
        return Ok(0);
    }

    let mut expanded = node.clone();
    load_directory_contents(&mut expanded, config)?;
    let added = expanded.size;
    tree.replace_subtree(path, expanded)?;
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("sub")).unwrap();
        fs::create_dir(root.join("sub/inner")).unwrap();
        fs::create_dir(root.join(".hidden")).unwrap();

        fs::write(root.join("a.bin"), vec![0u8; 100]).unwrap();
        fs::write(root.join("b.bin"), vec![0u8; 50]).unwrap();
        fs::write(root.join("sub/c.txt"), "hello").unwrap();

        temp
    }

    #[test]
    fn test_scan_single_level() {
        let temp = create_test_tree();
        let update = scan_directory(temp.path(), &ScanConfig::new()).unwrap();

        assert_eq!(update.file_count, 2);
        assert_eq!(update.dir_count, 2);
        assert_eq!(update.total_bytes, 150);
        assert!(update.snapshot.is_loaded());
        assert!(update.snapshot.subdirs.iter().all(|d| !d.is_loaded() && d.size == 0));
        // Not recursed: sub/c.txt is not counted.
        assert_eq!(update.snapshot.size, 150);
    }

    #[test]
    fn test_scan_skips_hidden_and_ignored() {
        let temp = create_test_tree();
        let config = ScanConfig::builder()
            .include_hidden(false)
            .ignore_patterns(vec!["*.bin".to_string()])
            .build()
            .unwrap();
        let update = scan_directory(temp.path(), &config).unwrap();

        assert_eq!(update.file_count, 0);
        assert_eq!(update.dir_count, 1);
        assert_eq!(update.snapshot.subdirs[0].path, temp.path().join("sub"));
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone");
        let err = scan_directory(&missing, &ScanConfig::new()).unwrap_err();
        assert!(matches!(err, ReadError::NotFound { .. }));
        assert_eq!(err.path(), missing.as_path());
    }

    #[test]
    fn test_scan_file_is_not_a_directory() {
        let temp = create_test_tree();
        let err = scan_directory(&temp.path().join("a.bin"), &ScanConfig::new()).unwrap_err();
        assert!(matches!(err, ReadError::NotADirectory { .. }));
    }

    #[test]
    fn test_load_directory_contents() {
        let temp = create_test_tree();
        let mut node = DirectoryNode::placeholder(temp.path().join("sub"));

        load_directory_contents(&mut node, &ScanConfig::new()).unwrap();
        assert!(node.is_loaded());
        assert_eq!(node.size, 5);
        assert_eq!(node.file_count, 1);
        assert_eq!(node.subdir_count, 1);

        // Second call is a no-op even though the directory changed.
        fs::write(temp.path().join("sub/d.txt"), "more").unwrap();
        load_directory_contents(&mut node, &ScanConfig::new()).unwrap();
        assert_eq!(node.size, 5);
    }

    #[test]
    fn test_load_skips_node_being_loaded() {
        let temp = create_test_tree();
        let mut node = DirectoryNode::placeholder(temp.path().join("sub"));
        assert!(node.begin_loading());

        load_directory_contents(&mut node, &ScanConfig::new()).unwrap();
        assert!(node.is_loading());
        assert!(node.files.is_empty());
    }

    #[test]
    fn test_load_failure_resets_state() {
        let temp = TempDir::new().unwrap();
        let mut node = DirectoryNode::placeholder(temp.path().join("gone"));

        assert!(load_directory_contents(&mut node, &ScanConfig::new()).is_err());
        assert!(!node.is_loaded());
        assert!(!node.is_loading());
    }

    #[test]
    fn test_expand_in_tree() {
        let temp = create_test_tree();
        let config = ScanConfig::new();
        let mut tree = DirTree::new(temp.path());

        assert_eq!(expand_in_tree(&mut tree, temp.path(), &config).unwrap(), 150);
        let sub = temp.path().join("sub");
        assert_eq!(expand_in_tree(&mut tree, &sub, &config).unwrap(), 5);
        assert_eq!(expand_in_tree(&mut tree, &sub, &config).unwrap(), 0);

        assert_eq!(tree.total_size(), 155);
        assert!(tree.root.size_invariant_holds());
        assert!(matches!(
            expand_in_tree(&mut tree, &temp.path().join("nope"), &config),
            Err(ExpandError::Tree(_))
        ));
    }
}
