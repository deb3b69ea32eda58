//! Unbounded work queue feeding the bounded worker channel.
//!
//! Workers enqueue every subdirectory they discover without ever blocking.
//! A single manager task owns the overflow buffer and forwards paths into the
//! bounded channel the workers pull from, so producers and consumers of work
//! can never wait on each other.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::monitor::PipelineSample;

/// Where every outstanding unit of work currently is.
///
/// A path moves `buffered -> in_channel -> active` and each transition
/// increments the next counter before decrementing the previous one, so a
/// path is never invisible to a sampler reading in that order.
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    buffered: AtomicU64,
    in_channel: AtomicU64,
    active: AtomicU64,
    claimed_total: AtomicU64,
}

impl PipelineCounters {
    /// A worker took a path off the bounded channel.
    pub(crate) fn claim(&self) {
        self.claimed_total.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        self.in_channel.fetch_sub(1, Ordering::SeqCst);
    }

    /// A worker finished a path, including publishing and enqueueing.
    pub(crate) fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn sample(&self) -> PipelineSample {
        let claimed_total = self.claimed_total.load(Ordering::SeqCst);
        PipelineSample {
            claimed_total,
            buffered: self.buffered.load(Ordering::SeqCst),
            in_channel: self.in_channel.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
        }
    }
}

/// Producer side of the work queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<PathBuf>,
    counters: Arc<PipelineCounters>,
}

impl WorkQueue {
    pub(crate) fn new(counters: Arc<PipelineCounters>) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, counters }, rx)
    }

    /// Add a directory to be scanned. Never blocks.
    ///
    /// Returns false if the queue manager has already shut down.
    pub fn enqueue(&self, path: PathBuf) -> bool {
        self.counters.buffered.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(path).is_err() {
            self.counters.buffered.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Paths accepted but not yet forwarded to a worker.
    pub fn depth(&self) -> u64 {
        self.counters.buffered.load(Ordering::SeqCst)
    }
}

/// Forward queued paths into the bounded worker channel until cancelled.
///
/// Exits when the token fires, when every worker is gone, or when all
/// producers are gone and the buffer is drained.
pub(crate) async fn run_queue_manager(
    mut inbound: mpsc::UnboundedReceiver<PathBuf>,
    outbound: mpsc::Sender<PathBuf>,
    counters: Arc<PipelineCounters>,
    cancel: CancellationToken,
) {
    let mut buffer: VecDeque<PathBuf> = VecDeque::new();
    let mut inbound_open = true;

    loop {
        if buffer.is_empty() {
            if !inbound_open {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = inbound.recv() => match received {
                    Some(path) => buffer.push_back(path),
                    None => inbound_open = false,
                },
            }
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = outbound.reserve() => {
                let Ok(permit) = permit else {
                    break;
                };
                if let Some(path) = buffer.pop_front() {
                    counters.in_channel.fetch_add(1, Ordering::SeqCst);
                    permit.send(path);
                    counters.buffered.fetch_sub(1, Ordering::SeqCst);
                }
            }
            received = inbound.recv(), if inbound_open => match received {
                Some(path) => buffer.push_back(path),
                None => inbound_open = false,
            },
        }
    }

    trace!(pending = buffer.len(), "Queue manager exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_forwards_in_fifo_order_past_capacity() {
        let counters = Arc::new(PipelineCounters::default());
        let (queue, inbound) = WorkQueue::new(counters.clone());
        let (job_tx, mut job_rx) = mpsc::channel(2);
        let cancel = CancellationToken::new();

        for i in 0..10 {
            assert!(queue.enqueue(PathBuf::from(format!("/d{i}"))));
        }
        let manager = tokio::spawn(run_queue_manager(inbound, job_tx, counters.clone(), cancel.clone()));

        for i in 0..10 {
            let path = job_rx.recv().await.unwrap();
            assert_eq!(path, PathBuf::from(format!("/d{i}")));
            counters.claim();
            counters.release();
        }

        let sample = counters.sample();
        assert_eq!(sample.claimed_total, 10);
        assert!(sample.is_idle());

        cancel.cancel();
        manager.await.unwrap();
        assert!(!queue.enqueue(PathBuf::from("/late")));
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_manager_stops_on_cancel_while_blocked() {
        let counters = Arc::new(PipelineCounters::default());
        let (queue, inbound) = WorkQueue::new(counters.clone());
        let (job_tx, _job_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        queue.enqueue(PathBuf::from("/a"));
        queue.enqueue(PathBuf::from("/b"));
        let manager = tokio::spawn(run_queue_manager(inbound, job_tx, counters.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), manager)
            .await
            .unwrap()
            .unwrap();
    }
}
