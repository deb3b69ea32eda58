//! Streaming events produced by the scan pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants};

use crate::node::{DirectoryNode, FileEntry};
use crate::progress::ScanProgress;

/// Result of listing a single directory.
///
/// The statistics describe the directory's direct contents only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUpdate {
    /// Directory this update describes.
    pub path: PathBuf,
    /// Number of direct files.
    pub file_count: usize,
    /// Number of direct subdirectories.
    pub dir_count: usize,
    /// Bytes held by direct files.
    pub total_bytes: u64,
    /// Loaded node with files enumerated and subdirectory placeholders.
    pub snapshot: DirectoryNode,
    /// Time spent listing the directory.
    pub scan_time: Duration,
}

impl StreamUpdate {
    /// Build an update from a freshly listed snapshot.
    pub fn from_snapshot(snapshot: DirectoryNode, scan_time: Duration) -> Self {
        Self {
            path: snapshot.path.clone(),
            file_count: snapshot.file_count,
            dir_count: snapshot.subdir_count,
            total_bytes: snapshot.direct_bytes(),
            snapshot,
            scan_time,
        }
    }

    /// Paths of the subdirectories discovered by this scan.
    pub fn subdir_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.snapshot.subdirs.iter().map(|d| &d.path)
    }
}

/// Event delivered on the update channel.
#[derive(Debug, Clone, EnumDiscriminants)]
#[strum_discriminants(name(ScanEventKind), derive(Display, Hash))]
pub enum ScanEvent {
    /// A file found directly inside `dir`.
    FileEntry { dir: PathBuf, entry: FileEntry },
    /// A subdirectory placeholder found directly inside `dir`.
    DirEntry { dir: PathBuf, path: PathBuf },
    /// A directory was fully listed.
    SizeUpdate(StreamUpdate),
    /// Periodic pipeline statistics.
    Progress(ScanProgress),
    /// A directory could not be read; its subtree is skipped.
    Error { path: PathBuf, message: String },
    /// No further events will follow.
    Complete,
}

impl ScanEvent {
    /// Check if this is the terminal event.
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanEvent::Complete)
    }

    /// Directory the event refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ScanEvent::FileEntry { dir, .. } | ScanEvent::DirEntry { dir, .. } => Some(dir),
            ScanEvent::SizeUpdate(update) => Some(&update.path),
            ScanEvent::Error { path, .. } => Some(path),
            ScanEvent::Progress(_) | ScanEvent::Complete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_from_snapshot() {
        let snapshot = DirectoryNode::loaded(
            "/root",
            vec![FileEntry::new("a", 100), FileEntry::new("b", 50)],
            vec![DirectoryNode::placeholder("/root/sub")],
        );
        let update = StreamUpdate::from_snapshot(snapshot, Duration::ZERO);

        assert_eq!(update.file_count, 2);
        assert_eq!(update.dir_count, 1);
        assert_eq!(update.total_bytes, 150);
        assert_eq!(
            update.subdir_paths().collect::<Vec<_>>(),
            vec![&PathBuf::from("/root/sub")]
        );
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(ScanEventKind::from(&ScanEvent::Complete).to_string(), "Complete");
        let err = ScanEvent::Error {
            path: PathBuf::from("/x"),
            message: "denied".into(),
        };
        assert_eq!(ScanEventKind::from(&err).to_string(), "Error");
        assert_eq!(err.path(), Some(&PathBuf::from("/x")));
        assert!(ScanEvent::Complete.is_complete());
    }
}
