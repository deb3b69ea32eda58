//! Scan progress reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Progress information during a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories listed so far.
    pub dirs_scanned: u64,
    /// Number of files seen so far.
    pub files_scanned: u64,
    /// Total bytes seen so far.
    pub bytes_scanned: u64,
    /// Number of directories that could not be read.
    pub errors_count: u64,
    /// Directories waiting to be scanned.
    pub queued: u64,
    /// Directories being scanned right now.
    pub active: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate scan rate in directories per second.
    pub fn dirs_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.dirs_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}

/// Shared progress counters updated concurrently by scan workers.
#[derive(Debug)]
pub struct ProgressTracker {
    start_time: Instant,
    dirs_scanned: AtomicU64,
    files_scanned: AtomicU64,
    bytes_scanned: AtomicU64,
    errors_count: AtomicU64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            dirs_scanned: AtomicU64::new(0),
            files_scanned: AtomicU64::new(0),
            bytes_scanned: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
        }
    }

    /// Record one listed directory and its direct contents.
    pub fn record_dir(&self, files: u64, bytes: u64) {
        self.dirs_scanned.fetch_add(1, Ordering::Relaxed);
        self.files_scanned.fetch_add(files, Ordering::Relaxed);
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot, filling in the current queue state.
    pub fn snapshot(&self, queued: u64, active: u64) -> ScanProgress {
        ScanProgress {
            dirs_scanned: self.dirs_scanned.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            errors_count: self.errors_count.load(Ordering::Relaxed),
            queued,
            active,
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_with_zero_elapsed() {
        let progress = ScanProgress {
            dirs_scanned: 10,
            bytes_scanned: 1000,
            ..Default::default()
        };
        assert_eq!(progress.dirs_per_second(), 0.0);
        assert_eq!(progress.bytes_per_second(), 0.0);
    }

    #[test]
    fn test_tracker_snapshot() {
        let tracker = ProgressTracker::new();
        tracker.record_dir(3, 300);
        tracker.record_dir(1, 50);
        tracker.record_error();

        let snap = tracker.snapshot(4, 2);
        assert_eq!(snap.dirs_scanned, 2);
        assert_eq!(snap.files_scanned, 4);
        assert_eq!(snap.bytes_scanned, 350);
        assert_eq!(snap.errors_count, 1);
        assert_eq!(snap.queued, 4);
        assert_eq!(snap.active, 2);
        assert_eq!(snap.total_items(), 6);
    }
}
