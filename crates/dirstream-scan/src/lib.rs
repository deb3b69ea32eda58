//! Streaming directory scanner for dirstream.
//!
//! This crate lists a directory tree one level at a time on a bounded pool of
//! tokio workers and streams each directory's snapshot as soon as it is
//! listed, so consumers can show a usable tree long before the scan ends.
//!
//! # Overview
//!
//! - **Single-level scans** on the blocking pool, one directory per job
//! - **Unbounded work queue** so discovering work never blocks a worker
//! - **Debounced completion** detection with a single terminal event
//! - **Cooperative cancellation** via a shared `CancellationToken`
//! - **Lazy expansion** of individual directories without a full scan
//!
//! # Example
//!
//! ```rust,no_run
//! use dirstream_scan::{ScanConfig, ScanEvent, StreamingScanner};
//!
//! # async fn run() -> Result<(), dirstream_scan::ScanError> {
//! let scanner = StreamingScanner::new(ScanConfig::new());
//! let (handle, mut streams) = scanner.start("/path/to/scan")?;
//!
//! while let Some(event) = streams.updates.recv().await {
//!     match event {
//!         ScanEvent::SizeUpdate(update) => {
//!             println!("{}: {} bytes", update.path.display(), update.total_bytes)
//!         }
//!         ScanEvent::Complete => break,
//!         _ => {}
//!     }
//! }
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

mod level;
mod monitor;
mod pipeline;
mod pool;
mod queue;

pub use level::{ExpandError, expand_in_tree, load_directory_contents, scan_directory};
pub use monitor::{MonitorState, PipelineSample};
pub use pipeline::{ScanHandle, ScanStreams, StreamingScanner, synchronize};
pub use queue::WorkQueue;

// Re-export core types for convenience
pub use dirstream_core::{
    DirTree, DirectoryNode, FileEntry, ReadError, ScanConfig, ScanError, ScanEvent,
    ScanObserver, ScanProgress, StreamUpdate, TreeSynchronizer,
};
