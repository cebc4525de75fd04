use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::applier::TaskApplier;
use crate::error::{io_err, ServerError};
use crate::listener::serve;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root of the mirrored tree; created when missing.
    pub destination_root: PathBuf,
    pub listen_addr: SocketAddr,
    /// Largest frame payload accepted from a client.
    pub max_frame_len: usize,
}

/// Start the server runtime and block the current thread until it exits.
pub fn start_blocking(config: ServerConfig) -> Result<(), ServerError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Bind and serve until ctrl-c.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let root = &config.destination_root;
    if !root.exists() {
        fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
        tracing::info!(path = %root.display(), "created destination directory");
    }

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.listen_addr,
            source,
        })?;
    let local = listener
        .local_addr()
        .map_err(|e| io_err("listener local address", e))?;
    tracing::info!(
        addr = %local,
        destination = %root.display(),
        "sync server listening",
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let applier = Arc::new(TaskApplier::new(root.clone()));

    let server_handle = {
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(serve(listener, applier, config.max_frame_len, shutdown_rx))
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("received ctrl-c, shutting down server"),
                Err(err) => tracing::warn!(error = %err, "ctrl-c handler failed"),
            }
            let _ = shutdown.send(());
        })
    };

    let result = server_handle
        .await
        .map_err(|err| ServerError::Join("listener", err.to_string()))?;
    signal_handle.abort();
    result
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
