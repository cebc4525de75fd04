use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use replica_core::ProtocolError;

/// Error surface for the listener, per-connection loops, and the applier.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0} task join failure: {1}")]
    Join(&'static str, String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServerError {
    ServerError::Io {
        path: path.into(),
        source,
    }
}
