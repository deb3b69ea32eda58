//! Splicing streamed directory snapshots into the live tree.
//!
//! The synchronizer is the tree's only writer. Producers hand it
//! [`ScanEvent`]s by value, in arrival order; updates for unrelated subtrees
//! may interleave arbitrarily, but a directory's placeholder always exists
//! before its own update can arrive because the placeholder is created by the
//! parent's scan.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::event::{ScanEvent, ScanEventKind, StreamUpdate};
use crate::observe::{ScanObserver, TracingObserver};
use crate::progress::ScanProgress;
use crate::tree::DirTree;

/// What applying one event did to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The root was replaced by its first snapshot.
    RootReplaced { size: u64 },
    /// A placeholder was replaced and `added` bytes propagated to ancestors.
    Integrated { path: PathBuf, added: u64 },
    /// The directory was already loaded; nothing changed.
    Duplicate { path: PathBuf },
    /// No matching parent or placeholder; the update was dropped.
    Orphaned { path: PathBuf },
    /// Informational event, tree untouched.
    Noted,
    /// End of stream.
    Finished,
}

/// Counters of what the synchronizer has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub integrated: u64,
    pub duplicates: u64,
    pub orphaned: u64,
    pub errors: u64,
}

/// Consumes scan events and keeps a [`DirTree`] up to date.
pub struct TreeSynchronizer {
    tree: DirTree,
    observer: Arc<dyn ScanObserver>,
    stats: SyncStats,
    last_progress: Option<ScanProgress>,
    finished: bool,
}

impl TreeSynchronizer {
    /// Start from a placeholder root at `root_path`.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self::with_tree(DirTree::new(root_path))
    }

    /// Continue synchronizing an existing tree.
    pub fn with_tree(tree: DirTree) -> Self {
        Self {
            tree,
            observer: Arc::new(TracingObserver),
            stats: SyncStats::default(),
            last_progress: None,
            finished: false,
        }
    }

    /// Route inconsistency reports to a custom observer.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn tree(&self) -> &DirTree {
        &self.tree
    }

    /// Mutable access for collaborators (deletion, rename, lazy expansion).
    pub fn tree_mut(&mut self) -> &mut DirTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> DirTree {
        self.tree
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Most recent progress event, if any.
    pub fn last_progress(&self) -> Option<&ScanProgress> {
        self.last_progress.as_ref()
    }

    /// Check if the terminal event has been applied.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Apply one event.
    pub fn apply(&mut self, event: ScanEvent) -> SyncOutcome {
        trace!(kind = %ScanEventKind::from(&event), "Applying scan event");
        match event {
            ScanEvent::SizeUpdate(update) => self.integrate(update),
            ScanEvent::Progress(progress) => {
                self.last_progress = Some(progress);
                SyncOutcome::Noted
            }
            ScanEvent::Error { .. } => {
                self.stats.errors += 1;
                SyncOutcome::Noted
            }
            ScanEvent::FileEntry { .. } | ScanEvent::DirEntry { .. } => SyncOutcome::Noted,
            ScanEvent::Complete => {
                self.finished = true;
                SyncOutcome::Finished
            }
        }
    }

    /// Splice one directory snapshot into the tree.
    pub fn integrate(&mut self, update: StreamUpdate) -> SyncOutcome {
        let path = update.path;
        let snapshot = update.snapshot;

        if path == self.tree.root.path {
            if self.tree.root.is_loaded() {
                self.stats.duplicates += 1;
                return SyncOutcome::Duplicate { path };
            }
            let size = snapshot.size;
            self.tree.root = snapshot;
            self.stats.integrated += 1;
            return SyncOutcome::RootReplaced { size };
        }

        let Some(chain) = path.parent().and_then(|parent| self.tree.locate(parent)) else {
            return self.orphan(path, "parent directory is not in the tree");
        };

        let parent = self.tree.node_at_mut(&chain);
        let Some(slot) = parent.subdirs.iter_mut().find(|d| d.path == path) else {
            return self.orphan(path, "parent has no placeholder for this directory");
        };
        if slot.is_loaded() {
            self.stats.duplicates += 1;
            return SyncOutcome::Duplicate { path };
        }

        let removed = slot.size;
        let added = snapshot.size;
        *slot = snapshot;
        self.tree.adjust_sizes(&chain, removed, added);
        self.stats.integrated += 1;
        SyncOutcome::Integrated { path, added }
    }

    fn orphan(&mut self, path: PathBuf, reason: &str) -> SyncOutcome {
        self.observer.inconsistency(&path, reason);
        self.stats.orphaned += 1;
        SyncOutcome::Orphaned { path }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::node::{DirectoryNode, FileEntry};
    use crate::observe::NoopObserver;

    fn update(path: &str, files: &[(&str, u64)], subdirs: &[&str]) -> StreamUpdate {
        let snapshot = DirectoryNode::loaded(
            path,
            files.iter().map(|(n, s)| FileEntry::new(*n, *s)).collect(),
            subdirs.iter().map(|p| DirectoryNode::placeholder(*p)).collect(),
        );
        StreamUpdate::from_snapshot(snapshot, Duration::ZERO)
    }

    fn sync() -> TreeSynchronizer {
        TreeSynchronizer::new("/r").with_observer(Arc::new(NoopObserver))
    }

    #[test]
    fn test_root_then_child() {
        let mut sync = sync();
        assert_eq!(
            sync.integrate(update("/r", &[("a", 100), ("b", 50)], &["/r/sub"])),
            SyncOutcome::RootReplaced { size: 150 }
        );
        assert_eq!(
            sync.integrate(update("/r/sub", &[("c", 25)], &[])),
            SyncOutcome::Integrated {
                path: PathBuf::from("/r/sub"),
                added: 25
            }
        );
        assert_eq!(sync.tree().total_size(), 175);
        assert!(sync.tree().root.size_invariant_holds());
    }

    #[test]
    fn test_replay_is_idempotent() {
        let mut sync = sync();
        sync.integrate(update("/r", &[("a", 10)], &["/r/s"]));
        sync.integrate(update("/r/s", &[("b", 5)], &[]));
        let outcome = sync.integrate(update("/r/s", &[("b", 5)], &[]));

        assert!(matches!(outcome, SyncOutcome::Duplicate { .. }));
        assert!(matches!(
            sync.integrate(update("/r", &[("a", 10)], &["/r/s"])),
            SyncOutcome::Duplicate { .. }
        ));
        assert_eq!(sync.tree().total_size(), 15);
        assert_eq!(sync.stats().duplicates, 2);
    }

    #[test]
    fn test_orphan_dropped() {
        let mut sync = sync();
        sync.integrate(update("/r", &[], &["/r/s"]));
        assert!(matches!(
            sync.integrate(update("/r/x/y", &[("z", 1)], &[])),
            SyncOutcome::Orphaned { .. }
        ));
        assert!(matches!(
            sync.integrate(update("/r/t", &[("z", 1)], &[])),
            SyncOutcome::Orphaned { .. }
        ));
        assert_eq!(sync.stats().orphaned, 2);
        assert_eq!(sync.tree().total_size(), 0);
    }

    #[test]
    fn test_complete_marks_finished() {
        let mut sync = sync();
        assert!(!sync.is_finished());
        assert_eq!(sync.apply(ScanEvent::Complete), SyncOutcome::Finished);
        assert!(sync.is_finished());
    }
}
