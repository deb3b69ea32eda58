//! Completion detection.
//!
//! The pipeline has no natural end: workers discover work as they go. The
//! monitor samples the pipeline counters on a fixed interval and declares the
//! scan finished only after an idle sample is confirmed by a second idle
//! sample taken one debounce window later with no claims in between.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use strum::Display;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dirstream_core::{ProgressTracker, ScanEvent, ScanObserver};

use crate::queue::PipelineCounters;

/// Point-in-time view of where outstanding work is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSample {
    /// Paths waiting in the unbounded queue.
    pub buffered: u64,
    /// Paths in the bounded worker channel.
    pub in_channel: u64,
    /// Paths a worker is currently processing.
    pub active: u64,
    /// Paths ever claimed by a worker.
    pub claimed_total: u64,
}

impl PipelineSample {
    /// Check if nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.buffered == 0 && self.in_channel == 0 && self.active == 0
    }

    /// Paths not yet claimed by a worker.
    pub fn queued(&self) -> u64 {
        self.buffered + self.in_channel
    }
}

/// Completion monitor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MonitorState {
    /// Work is outstanding.
    Waiting,
    /// One idle sample seen; waiting out the debounce window.
    Confirming,
    /// The scan is complete. Terminal.
    Done,
}

impl MonitorState {
    /// Next state given a fresh sample.
    ///
    /// `baseline` is the sample that moved the monitor into
    /// [`MonitorState::Confirming`]; it is ignored in other states.
    pub fn advance(self, sample: &PipelineSample, baseline: &PipelineSample) -> Self {
        match self {
            MonitorState::Waiting if sample.is_idle() => MonitorState::Confirming,
            MonitorState::Waiting => MonitorState::Waiting,
            MonitorState::Confirming
                if sample.is_idle() && sample.claimed_total == baseline.claimed_total =>
            {
                MonitorState::Done
            }
            MonitorState::Confirming => MonitorState::Waiting,
            MonitorState::Done => MonitorState::Done,
        }
    }
}

pub(crate) struct CompletionMonitor {
    pub(crate) counters: Arc<PipelineCounters>,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) updates: mpsc::Sender<ScanEvent>,
    pub(crate) observer: Arc<dyn ScanObserver>,
    pub(crate) cancel: CancellationToken,
    pub(crate) completed: Arc<AtomicBool>,
    pub(crate) poll_interval: Duration,
    pub(crate) confirm_window: Duration,
    pub(crate) emit_progress: bool,
}

impl CompletionMonitor {
    pub(crate) async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = MonitorState::Waiting;
        let mut baseline = PipelineSample::default();

        loop {
            match state {
                MonitorState::Waiting => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return,
                        _ = ticker.tick() => {}
                    }
                    let sample = self.counters.sample();
                    if self.emit_progress {
                        let progress = self.progress.snapshot(sample.queued(), sample.active);
                        // Progress is advisory; drop it when the consumer lags.
                        let _ = self.updates.try_send(ScanEvent::Progress(progress));
                    }
                    state = state.advance(&sample, &baseline);
                    baseline = sample;
                }
                MonitorState::Confirming => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.confirm_window) => {}
                    }
                    let sample = self.counters.sample();
                    state = state.advance(&sample, &baseline);
                    if state == MonitorState::Waiting {
                        debug!(claimed = sample.claimed_total, "Idle sample not confirmed");
                    }
                }
                MonitorState::Done => {
                    self.finish().await;
                    return;
                }
            }
        }
    }

    async fn finish(&self) {
        let progress = self.progress.snapshot(0, 0);
        self.completed.store(true, Ordering::SeqCst);
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.updates.send(ScanEvent::Complete) => sent.is_ok(),
        };
        if sent {
            self.observer.scan_completed(&progress);
        }
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(claimed_total: u64) -> PipelineSample {
        PipelineSample {
            claimed_total,
            ..Default::default()
        }
    }

    fn busy() -> PipelineSample {
        PipelineSample {
            active: 1,
            claimed_total: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_needs_confirmation() {
        let state = MonitorState::Waiting.advance(&idle(3), &idle(0));
        assert_eq!(state, MonitorState::Confirming);
        assert_eq!(state.advance(&idle(3), &idle(3)), MonitorState::Done);
    }

    #[test]
    fn test_busy_stays_waiting() {
        assert_eq!(
            MonitorState::Waiting.advance(&busy(), &idle(0)),
            MonitorState::Waiting
        );
    }

    #[test]
    fn test_new_claim_during_window_resets() {
        let state = MonitorState::Confirming.advance(&idle(4), &idle(3));
        assert_eq!(state, MonitorState::Waiting);
        assert_eq!(
            MonitorState::Confirming.advance(&busy(), &idle(1)),
            MonitorState::Waiting
        );
    }

    #[test]
    fn test_done_is_terminal() {
        assert_eq!(MonitorState::Done.advance(&busy(), &idle(0)), MonitorState::Done);
        assert_eq!(MonitorState::Done.to_string(), "Done");
    }

    #[test]
    fn test_queued_counts_buffer_and_channel() {
        let sample = PipelineSample {
            buffered: 2,
            in_channel: 3,
            ..Default::default()
        };
        assert_eq!(sample.queued(), 5);
        assert!(!sample.is_idle());
    }
}
