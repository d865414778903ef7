//! Run progress stream
//!
//! One ordered stream per run, consumed by exactly one caller. The sending
//! half is consumed by its terminal event ([`ProgressSender::finish`] or
//! [`ProgressSender::fail`]), so a stream always ends with exactly one
//! `complete` or `error` event. A consumer that goes away does not stop the
//! run: later sends are dropped.

use futures::Stream;
use rollcall_core::{ItemError, RunSummary};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle event of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Discovery finished and folders are ready
    Started {
        /// Eligible items
        total: usize,
        /// Distinct sub-group folders resolved up front
        categories: usize,
        /// Batches the run will execute
        total_batches: usize,
    },

    /// A batch is about to run
    BatchStarted {
        /// 1-based batch index
        batch: usize,
        /// Batches in the run
        total_batches: usize,
        /// Items in this batch
        size: usize,
    },

    /// A batch finished and its counter was committed
    BatchComplete {
        /// 1-based batch index
        batch: usize,
        /// Successes in this batch
        success: usize,
        /// Failures in this batch
        failed: usize,
        /// Items processed so far
        processed: usize,
        /// Successes so far
        total_success: usize,
        /// Failures so far
        total_failed: usize,
        /// Cumulative percentage, two decimals
        percentage: f64,
    },

    /// Run finished
    Complete {
        /// Final totals
        #[serde(flatten)]
        summary: RunSummary,
        /// Always 100
        percentage: f64,
    },

    /// Run aborted
    Error {
        /// Reason
        message: String,
    },
}

impl ProgressEvent {
    /// Whether this event ends the stream
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Wire name of the event kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::BatchStarted { .. } => "batch_started",
            Self::BatchComplete { .. } => "batch_complete",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Percentage of `done` over `total`, rounded to two decimals
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn percentage(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = done as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Create a connected sender/stream pair
#[must_use]
pub fn channel() -> (ProgressSender, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressStream { rx })
}

/// Producing half, owned by the run
#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Report discovery results
    pub fn started(&self, total: usize, categories: usize, total_batches: usize) {
        self.send(ProgressEvent::Started {
            total,
            categories,
            total_batches,
        });
    }

    /// Report the start of a batch
    pub fn batch_started(&self, batch: usize, total_batches: usize, size: usize) {
        self.send(ProgressEvent::BatchStarted {
            batch,
            total_batches,
            size,
        });
    }

    /// Report a finished batch
    pub fn batch_complete(&self, event: ProgressEvent) {
        debug_assert!(matches!(event, ProgressEvent::BatchComplete { .. }));
        self.send(event);
    }

    /// Close the stream with the final summary
    pub fn finish(self, summary: RunSummary) {
        self.send(ProgressEvent::Complete {
            summary,
            percentage: 100.0,
        });
    }

    /// Close the stream with a fatal error
    pub fn fail(self, message: impl Into<String>) {
        self.send(ProgressEvent::Error {
            message: message.into(),
        });
    }

    /// Whether the consumer is still attached
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, event: ProgressEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            debug!(event = kind, "progress consumer gone, event dropped");
        }
    }
}

/// Consuming half, handed to the caller
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressStream {
    /// Next event, or `None` once the run has closed the stream
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drain every event until the stream closes
    pub async fn collect_all(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Per-item failures kept for reporting, bounded by a cap
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    cap: usize,
    kept: Vec<ItemError>,
    seen: usize,
}

impl ErrorLog {
    /// Create log keeping at most `cap` entries
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            kept: Vec::new(),
            seen: 0,
        }
    }

    /// Record a failure; entries past the cap are counted only
    pub fn push(&mut self, error: ItemError) {
        self.seen += 1;
        if self.kept.len() < self.cap {
            self.kept.push(error);
        }
    }

    /// Append another log, respecting this log's cap
    pub fn extend(&mut self, other: ErrorLog) {
        self.seen += other.seen - other.kept.len();
        for error in other.kept {
            self.push(error);
        }
    }

    /// Failures recorded, including dropped ones
    #[inline]
    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Kept entries
    #[must_use]
    pub fn into_inner(self) -> Vec<ItemError> {
        self.kept
    }
}
