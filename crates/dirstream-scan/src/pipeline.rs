//! Lifecycle of a streaming scan.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dirstream_core::{
    ProgressTracker, ReadError, ScanConfig, ScanError, ScanEvent, ScanObserver, SyncOutcome,
    TracingObserver, TreeSynchronizer,
};

use crate::monitor::CompletionMonitor;
use crate::pool::{WorkerContext, spawn_workers};
use crate::queue::{PipelineCounters, WorkQueue, run_queue_manager};

/// Entry point for streaming scans.
///
/// # Example
///
/// ```no_run
/// use dirstream_core::{ScanConfig, TreeSynchronizer};
/// use dirstream_scan::{StreamingScanner, synchronize};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let (handle, mut streams) = StreamingScanner::new(ScanConfig::new()).start("/home")?;
/// let mut sync = TreeSynchronizer::new("/home");
/// synchronize(&mut sync, &mut streams.updates).await;
/// handle.stop().await;
/// println!("{} bytes", sync.tree().total_size());
/// # Ok(())
/// # }
/// ```
pub struct StreamingScanner {
    config: ScanConfig,
    observer: Arc<dyn ScanObserver>,
}

impl StreamingScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Route pipeline diagnostics to a custom observer.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Start scanning `root` on the current tokio runtime.
    ///
    /// Returns immediately. The root is the first unit of work; everything
    /// below it is discovered by the workers.
    pub fn start(
        &self,
        root: impl Into<PathBuf>,
    ) -> Result<(ScanHandle, ScanStreams), ScanError> {
        self.config
            .check()
            .map_err(|message| ScanError::InvalidConfig { message })?;
        let runtime = Handle::try_current().map_err(|_| ScanError::NoRuntime)?;

        let root = root.into();
        let workers = self.config.effective_workers();
        let cancel = CancellationToken::new();
        let counters = Arc::new(PipelineCounters::default());
        let progress = Arc::new(ProgressTracker::new());
        let completed = Arc::new(AtomicBool::new(false));

        let (update_tx, update_rx) = mpsc::channel(self.config.update_channel_capacity);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (job_tx, job_rx) = mpsc::channel(self.config.work_channel_capacity);
        let (queue, inbound) = WorkQueue::new(Arc::clone(&counters));

        // Queued before anything runs so the monitor never sees an empty
        // pipeline at startup.
        queue.enqueue(root.clone());

        let mut tasks = Vec::with_capacity(workers + 2);
        tasks.push(runtime.spawn(run_queue_manager(
            inbound,
            job_tx,
            Arc::clone(&counters),
            cancel.clone(),
        )));

        let ctx = WorkerContext {
            config: Arc::new(self.config.clone()),
            jobs: Arc::new(Mutex::new(job_rx)),
            queue,
            counters: Arc::clone(&counters),
            progress: Arc::clone(&progress),
            updates: update_tx.clone(),
            errors: error_tx,
            observer: Arc::clone(&self.observer),
            cancel: cancel.clone(),
        };
        tasks.extend(spawn_workers(&runtime, workers, &ctx));
        drop(ctx);

        let monitor = CompletionMonitor {
            counters,
            progress,
            updates: update_tx,
            observer: Arc::clone(&self.observer),
            cancel: cancel.clone(),
            completed: Arc::clone(&completed),
            poll_interval: self.config.poll_interval(),
            confirm_window: self.config.confirm_window(),
            emit_progress: self.config.emit_progress,
        };
        tasks.push(runtime.spawn(monitor.run()));

        self.observer.scan_started(&root, workers);

        let handle = ScanHandle {
            root,
            cancel,
            completed,
            tasks,
            observer: Arc::clone(&self.observer),
        };
        let streams = ScanStreams {
            updates: update_rx,
            errors: error_rx,
        };
        Ok((handle, streams))
    }
}

/// Control side of a running scan.
///
/// Dropping the handle cancels the scan without waiting for it.
pub struct ScanHandle {
    root: PathBuf,
    cancel: CancellationToken,
    completed: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    observer: Arc<dyn ScanObserver>,
}

impl ScanHandle {
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Token that cancels the scan when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check if the completion monitor declared the scan complete.
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Check if every pipeline task has exited.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Cancel the scan and wait for every task to exit.
    ///
    /// Once this returns both channels are closed: receivers yield whatever
    /// is still buffered and then `None`.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(root = %self.root.display(), error = %err, "Scan task panicked");
                }
            }
        }
        if !self.is_complete() {
            self.observer.scan_cancelled();
        }
        debug!(root = %self.root.display(), "Scan pipeline stopped");
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Consumer side of a running scan.
pub struct ScanStreams {
    /// Directory updates, progress, error mirrors and the final `Complete`.
    pub updates: mpsc::Receiver<ScanEvent>,
    /// Unreadable directories.
    pub errors: mpsc::UnboundedReceiver<ReadError>,
}

impl ScanStreams {
    /// Convert both channels into [`tokio_stream::Stream`]s.
    pub fn into_update_stream(
        self,
    ) -> (
        ReceiverStream<ScanEvent>,
        UnboundedReceiverStream<ReadError>,
    ) {
        (
            ReceiverStream::new(self.updates),
            UnboundedReceiverStream::new(self.errors),
        )
    }
}

/// Apply events to `sync` until the scan completes or the channel closes.
///
/// Returns true if the terminal `Complete` event was seen.
pub async fn synchronize(
    sync: &mut TreeSynchronizer,
    updates: &mut mpsc::Receiver<ScanEvent>,
) -> bool {
    while let Some(event) = updates.recv().await {
        if sync.apply(event) == SyncOutcome::Finished {
            return true;
        }
    }
    false
}
