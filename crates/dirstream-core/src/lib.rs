//! Core types for dirstream.
//!
//! This crate provides the data model shared by the scan pipeline and its
//! consumers: directory nodes, streaming events, configuration, the live
//! tree and the synchronizer that splices streamed snapshots into it.

mod config;
mod error;
mod event;
mod node;
mod observe;
mod progress;
mod sync;
mod tree;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{ReadError, ScanError, TreeError};
pub use event::{ScanEvent, ScanEventKind, StreamUpdate};
pub use node::{DirectoryNode, FileEntry, LoadState};
pub use observe::{NoopObserver, ScanObserver, TracingObserver};
pub use progress::{ProgressTracker, ScanProgress};
pub use sync::{SyncOutcome, SyncStats, TreeSynchronizer};
pub use tree::{DirTree, TreeSummary};
