use std::net::SocketAddr;
use std::path::PathBuf;

use crate::builder::TaskBuilder;
use crate::error::{io_err, ClientError};
use crate::queue::{run_consumer, ConsumerStats, SyncQueue};
use crate::scan::{scan_tree, seed_queue};
use crate::transport::TcpTransport;
use crate::watcher;

/// Everything the client needs to start a session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory tree to replicate.
    pub source_root: PathBuf,
    /// Resolved server address.
    pub server_addr: SocketAddr,
    /// Stop after the initial sync instead of watching for changes.
    pub once: bool,
}

/// Start the client runtime and block the current thread until it exits.
pub fn start_blocking(config: ClientConfig) -> Result<ConsumerStats, ClientError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run one replication session.
///
/// The queue is seeded from the initial scan before the watcher is
/// installed, so live events always land behind the scan entries.
pub async fn run(config: ClientConfig) -> Result<ConsumerStats, ClientError> {
    let root = config.source_root.clone();
    if !root.is_dir() {
        return Err(ClientError::SourceMissing(root));
    }

    let mut transport = TcpTransport::connect(config.server_addr).await?;
    let (queue, rx) = SyncQueue::new();

    let scan_root = root.clone();
    let scan = tokio::task::spawn_blocking(move || scan_tree(&scan_root))
        .await
        .map_err(|err| ClientError::Join("initial scan", err.to_string()))??;
    let dirs = scan.dirs.len();
    let files = scan.files.len();
    seed_queue(scan, &queue);
    tracing::info!(root = %root.display(), dirs, files, "initial sync queued");

    let _watcher = if config.once {
        None
    } else {
        Some(watcher::watch(&root, queue.clone())?)
    };
    // In `once` mode this is the last producer, so the consumer stops once drained.
    drop(queue);

    let builder = TaskBuilder::new(root);
    let outcome = tokio::select! {
        result = run_consumer(rx, &builder, &mut transport) => Some(result),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("received ctrl-c, shutting down client"),
                Err(err) => tracing::warn!(error = %err, "ctrl-c handler failed"),
            }
            None
        }
    };

    let stats = match outcome {
        Some(result) => result?,
        None => ConsumerStats::default(),
    };
    tracing::info!(frames = transport.frames_sent(), "session finished");
    Ok(stats)
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
