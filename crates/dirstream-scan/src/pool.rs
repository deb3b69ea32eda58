//! Bounded pool of scan workers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use dirstream_core::{ProgressTracker, ReadError, ScanConfig, ScanEvent, ScanObserver};

use crate::level::scan_directory_until;
use crate::queue::{PipelineCounters, WorkQueue};

/// Everything a worker shares with its siblings.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) config: Arc<ScanConfig>,
    pub(crate) jobs: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    pub(crate) queue: WorkQueue,
    pub(crate) counters: Arc<PipelineCounters>,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) updates: mpsc::Sender<ScanEvent>,
    pub(crate) errors: mpsc::UnboundedSender<ReadError>,
    pub(crate) observer: Arc<dyn ScanObserver>,
    pub(crate) cancel: CancellationToken,
}

pub(crate) fn spawn_workers(
    runtime: &Handle,
    count: usize,
    ctx: &WorkerContext,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| runtime.spawn(run_worker(id, ctx.clone())))
        .collect()
}

async fn next_job(jobs: &Mutex<mpsc::Receiver<PathBuf>>) -> Option<PathBuf> {
    jobs.lock().await.recv().await
}

async fn run_worker(id: usize, ctx: WorkerContext) {
    loop {
        let path = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            job = next_job(&ctx.jobs) => match job {
                Some(path) => path,
                None => break,
            },
        };

        // The job stays active until its update is published and its
        // children are queued.
        ctx.counters.claim();
        let keep_going = process(&ctx, path).await;
        ctx.counters.release();

        if !keep_going {
            break;
        }
    }
    trace!(worker = id, "Worker exiting");
}

/// Scan one directory and publish the result. Returns false when the worker
/// should stop.
async fn process(ctx: &WorkerContext, path: PathBuf) -> bool {
    let config = Arc::clone(&ctx.config);
    let cancel = ctx.cancel.clone();
    let target = path.clone();
    let listing = tokio::task::spawn_blocking(move || {
        scan_directory_until(&target, &config, &|| cancel.is_cancelled())
    })
    .await;

    if ctx.cancel.is_cancelled() {
        return false;
    }

    match listing {
        Ok(Ok(update)) => {
            ctx.progress
                .record_dir(update.file_count as u64, update.total_bytes);
            ctx.observer.directory_scanned(&update);

            if ctx.config.emit_entries {
                for entry in &update.snapshot.files {
                    let event = ScanEvent::FileEntry {
                        dir: update.path.clone(),
                        entry: entry.clone(),
                    };
                    if !publish(ctx, event).await {
                        return false;
                    }
                }
                for subdir in &update.snapshot.subdirs {
                    let event = ScanEvent::DirEntry {
                        dir: update.path.clone(),
                        path: subdir.path.clone(),
                    };
                    if !publish(ctx, event).await {
                        return false;
                    }
                }
            }

            let children: Vec<PathBuf> = update.subdir_paths().cloned().collect();
            if !publish(ctx, ScanEvent::SizeUpdate(update)).await {
                return false;
            }
            for child in children {
                ctx.queue.enqueue(child);
            }
            true
        }
        Ok(Err(err)) => {
            ctx.progress.record_error();
            ctx.observer.read_error(&err);
            let event = ScanEvent::Error {
                path: err.path().to_path_buf(),
                message: err.to_string(),
            };
            // Unbounded; nobody listening is fine.
            let _ = ctx.errors.send(err);
            publish(ctx, event).await
        }
        Err(join_error) => {
            warn!(path = %path.display(), error = %join_error, "Directory scan task failed");
            ctx.progress.record_error();
            true
        }
    }
}

/// Send an event, giving up if the pipeline is cancelled first.
///
/// A dropped receiver means nobody wants the results any more, so the whole
/// pipeline is cancelled.
async fn publish(ctx: &WorkerContext, event: ScanEvent) -> bool {
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => false,
        sent = ctx.updates.send(event) => {
            if sent.is_err() {
                ctx.cancel.cancel();
            }
            sent.is_ok()
        }
    }
}
