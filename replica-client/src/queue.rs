//! Sync queue: many producers, one sequential consumer.
//!
//! Producers (the initial scan and the watcher callback) only append
//! [`PendingOp`]s. The consumer turns each op into a [`SyncTask`] and sends
//! it before touching the next one, so the wire order is the enqueue order
//! and at most one file's content is in memory at a time.
//!
//! [`SyncTask`]: replica_core::SyncTask

use std::fmt;

use tokio::sync::mpsc;

use replica_core::RelativePath;

use crate::builder::TaskBuilder;
use crate::error::ClientError;
use crate::transport::TaskSink;

// ---------------------------------------------------------------------------
// Queue items
// ---------------------------------------------------------------------------

/// A change reported by the watcher, relative to the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(RelativePath),
    Changed(RelativePath),
    Deleted(RelativePath),
    Renamed {
        from: RelativePath,
        to: RelativePath,
    },
}

/// Work the consumer still has to perform to produce a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    /// Directory found by the initial scan.
    ScanDir(RelativePath),
    /// Regular file found by the initial scan.
    ScanFile(RelativePath),
    /// Live notification.
    Live(ChangeEvent),
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingOp::ScanDir(path) => write!(f, "scan dir {path}"),
            PendingOp::ScanFile(path) => write!(f, "scan file {path}"),
            PendingOp::Live(ChangeEvent::Created(path)) => write!(f, "created {path}"),
            PendingOp::Live(ChangeEvent::Changed(path)) => write!(f, "changed {path}"),
            PendingOp::Live(ChangeEvent::Deleted(path)) => write!(f, "deleted {path}"),
            PendingOp::Live(ChangeEvent::Renamed { from, to }) => {
                write!(f, "renamed {from} -> {to}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Producer handle
// ---------------------------------------------------------------------------

/// Cloneable, non-blocking producer handle onto the unbounded queue.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<PendingOp>,
}

impl SyncQueue {
    /// Create the queue and the receiver its single consumer drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingOp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append `op`. Never blocks; returns `false` once the consumer is gone.
    pub fn enqueue(&self, op: PendingOp) -> bool {
        match self.tx.send(op) {
            Ok(()) => true,
            Err(mpsc::error::SendError(op)) => {
                tracing::debug!(op = %op, "sync queue closed, dropping op");
                false
            }
        }
    }

    /// True once the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Counters reported when the consumer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub sent: usize,
    pub dropped: usize,
}

/// Drain `rx` until every producer handle is dropped.
///
/// Build failures, and tasks the sink rejects on their own (too large to
/// frame), drop the item and continue. A stream failure ends the session
/// and is returned.
pub async fn run_consumer<S>(
    mut rx: mpsc::UnboundedReceiver<PendingOp>,
    builder: &TaskBuilder,
    sink: &mut S,
) -> Result<ConsumerStats, ClientError>
where
    S: TaskSink + ?Sized,
{
    let mut stats = ConsumerStats::default();

    while let Some(op) = rx.recv().await {
        let label = op.to_string();
        let task = match builder.build(op).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                stats.dropped += 1;
                continue;
            }
            Err(err) => {
                tracing::warn!(op = %label, error = %err, "dropping sync op");
                stats.dropped += 1;
                continue;
            }
        };

        tracing::debug!(task = %task, "sending");
        match sink.send(task).await {
            Ok(()) => stats.sent += 1,
            Err(err) if err.is_item_error() => {
                tracing::warn!(op = %label, error = %err, "dropping unsendable task");
                stats.dropped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(sent = stats.sent, dropped = stats.dropped, "sync queue drained");
    Ok(stats)
}
