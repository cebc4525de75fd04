//! Error types for replica-client.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use replica_core::ProtocolError;

/// All errors that can arise on the source side.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Wire encoding or path validation failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not open the session to the server.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The session to the server failed mid-stream.
    #[error("transport to {addr} failed: {source}")]
    Transport {
        addr: SocketAddr,
        #[source]
        source: ProtocolError,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("source directory not found: {0}")]
    SourceMissing(PathBuf),

    #[error("{0} task join failure: {1}")]
    Join(&'static str, String),
}

impl ClientError {
    /// True when the error rejects a single task and the session can go on.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol(
                ProtocolError::FrameTooLarge { .. }
                    | ProtocolError::Json(_)
                    | ProtocolError::InvalidPath { .. }
            )
        )
    }
}

/// Convenience constructor for [`ClientError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ClientError {
    ClientError::Io {
        path: path.into(),
        source,
    }
}
