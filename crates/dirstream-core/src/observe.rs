//! Observability hooks for the scan pipeline and tree synchronizer.

use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::error::ReadError;
use crate::event::StreamUpdate;
use crate::progress::ScanProgress;

/// Sink for diagnostics emitted by the pipeline.
///
/// All methods default to doing nothing, so implementations only override
/// what they care about.
pub trait ScanObserver: Send + Sync {
    /// The pipeline started scanning `root` with `workers` tasks.
    fn scan_started(&self, _root: &Path, _workers: usize) {}

    /// A directory was listed and its update published.
    fn directory_scanned(&self, _update: &StreamUpdate) {}

    /// A directory could not be read.
    fn read_error(&self, _error: &ReadError) {}

    /// The tree received an update it could not place.
    fn inconsistency(&self, _path: &Path, _reason: &str) {}

    /// The completion monitor declared the scan finished.
    fn scan_completed(&self, _progress: &ScanProgress) {}

    /// The pipeline was stopped before completion.
    fn scan_cancelled(&self) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Observer that forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScanObserver for TracingObserver {
    fn scan_started(&self, root: &Path, workers: usize) {
        info!(root = %root.display(), workers, "Streaming scan started");
    }

    fn directory_scanned(&self, update: &StreamUpdate) {
        trace!(
            path = %update.path.display(),
            files = update.file_count,
            dirs = update.dir_count,
            bytes = update.total_bytes,
            "Directory scanned"
        );
    }

    fn read_error(&self, error: &ReadError) {
        debug!(path = %error.path().display(), %error, "Directory unreadable, skipping subtree");
    }

    fn inconsistency(&self, path: &Path, reason: &str) {
        warn!(path = %path.display(), reason, "Dropping update that does not fit the tree");
    }

    fn scan_completed(&self, progress: &ScanProgress) {
        info!(
            dirs = progress.dirs_scanned,
            files = progress.files_scanned,
            bytes = progress.bytes_scanned,
            errors = progress.errors_count,
            elapsed_ms = progress.elapsed.as_millis() as u64,
            "Streaming scan complete"
        );
    }

    fn scan_cancelled(&self) {
        info!("Streaming scan cancelled");
    }
}
