//! Connection listener and the per-connection decode/apply loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use replica_core::{decode_task, read_frame};

use crate::applier::TaskApplier;
use crate::error::ServerError;

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying `accept` after `failures` consecutive errors.
///
/// Doubles from 10ms up to 1s, so exhausted descriptors (EMFILE) do not
/// turn the accept loop into a busy spin.
pub fn accept_backoff(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1 << exponent)
        .min(ACCEPT_BACKOFF_MAX)
}

/// Per-connection counters, logged when the peer disconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub applied: usize,
    pub failed: usize,
    pub malformed: usize,
}

/// Accept connections until `shutdown` fires.
///
/// Every connection gets its own task; connections share nothing but the
/// applier's root, and a stalled or broken peer only stops its own loop.
pub async fn serve(
    listener: TcpListener,
    applier: Arc<TaskApplier>,
    max_frame_len: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let mut accept_failures = 0u32;
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => {
                        accept_failures = 0;
                        accepted
                    }
                    Err(err) => {
                        accept_failures = accept_failures.saturating_add(1);
                        let delay = accept_backoff(accept_failures);
                        tracing::warn!(error = %err, retry_in_ms = delay.as_millis() as u64, "accept failed");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                };
                let applier = applier.clone();
                tokio::spawn(async move {
                    let peer = peer.to_string();
                    tracing::info!(peer = %peer, "client connected");
                    match handle_connection(stream, &applier, &peer, max_frame_len).await {
                        Ok(stats) => tracing::info!(
                            peer = %peer,
                            applied = stats.applied,
                            failed = stats.failed,
                            malformed = stats.malformed,
                            "client disconnected",
                        ),
                        Err(err) => tracing::error!(peer = %peer, error = %err, "connection terminated"),
                    }
                });
            }
        }
    }

    Ok(())
}

/// Read frames from `reader` and apply them in order until the peer closes.
///
/// A malformed payload or a failed apply is logged and skipped. A stream
/// error (reset, truncated frame, oversized length) ends the loop.
pub async fn handle_connection<R>(
    mut reader: R,
    applier: &TaskApplier,
    peer: &str,
    max_frame_len: usize,
) -> Result<ConnectionStats, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut stats = ConnectionStats::default();

    while let Some(payload) = read_frame(&mut reader, max_frame_len).await? {
        let task = match decode_task(&payload) {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(peer = %peer, bytes = payload.len(), error = %err, "received invalid task");
                stats.malformed += 1;
                continue;
            }
        };

        match applier.apply(&task).await {
            Ok(()) => {
                tracing::info!(peer = %peer, task = %task, "applied");
                stats.applied += 1;
            }
            Err(err) => {
                tracing::warn!(peer = %peer, task = %task, error = %err, "apply failed");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
