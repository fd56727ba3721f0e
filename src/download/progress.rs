//! Progress reports and the sinks that receive them.
//!
//! A transfer publishes one [`ProgressReport`] per chunk. Sinks must never
//! block the transfer: the channel-backed sinks drop or coalesce reports
//! when the consumer falls behind, and the transfer never waits for them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::trace;

/// Snapshot of a transfer, recomputed after every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Bytes written to the destination so far.
    pub bytes_transferred: u64,
    /// Expected total size, when known.
    pub total: Option<u64>,
    /// Completion fraction in `[0.0, 1.0]`; stays `0.0` while the total is unknown.
    pub fraction: f64,
}

impl ProgressReport {
    /// Builds a report, clamping the fraction into `[0.0, 1.0]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(bytes_transferred: u64, total: Option<u64>) -> Self {
        let fraction = match total {
            Some(0) => 1.0,
            Some(total) => (bytes_transferred as f64 / total as f64).clamp(0.0, 1.0),
            None => 0.0,
        };
        Self {
            bytes_transferred,
            total,
            fraction,
        }
    }

    /// Returns true when the total is known and has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total
            .is_some_and(|total| self.bytes_transferred >= total)
    }
}

/// Receiver of progress reports.
///
/// Implementations must return promptly; delivery is best-effort and the
/// download's correctness never depends on a report being observed.
pub trait ProgressSink: Send + Sync {
    /// Publishes one report.
    fn report(&self, report: ProgressReport);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressReport) + Send + Sync,
{
    fn report(&self, report: ProgressReport) {
        self(report);
    }
}

/// Sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _report: ProgressReport) {}
}

/// Bounded-queue sink: reports are dropped while the queue is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<ProgressReport>,
}

impl ChannelSink {
    /// Creates a sink and its receiver with the given queue capacity.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressReport>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, report: ProgressReport) {
        if let Err(e) = self.sender.try_send(report) {
            trace!(error = %e, "progress report dropped");
        }
    }
}

/// Latest-value sink: a slow consumer only ever sees the newest report.
#[derive(Debug, Clone)]
pub struct WatchSink {
    sender: Arc<watch::Sender<ProgressReport>>,
}

impl WatchSink {
    /// Creates a sink and its receiver, starting from an empty report.
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<ProgressReport>) {
        let (sender, receiver) = watch::channel(ProgressReport::default());
        (
            Self {
                sender: Arc::new(sender),
            },
            receiver,
        )
    }
}

impl ProgressSink for WatchSink {
    fn report(&self, report: ProgressReport) {
        self.sender.send_replace(report);
    }
}

/// Shared handle to a sink, as stored in a [`DownloadTask`](super::DownloadTask).
pub type SharedProgressSink = Arc<dyn ProgressSink>;

/// Debug helper for structs holding a sink.
pub(crate) struct SinkDebug;

impl fmt::Debug for SinkDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<progress sink>")
    }
}
