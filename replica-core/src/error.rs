//! Error types for replica-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating, encoding, or decoding sync tasks.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A relative path failed validation.
    #[error("invalid relative path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Payload could not be serialized or parsed as a sync task.
    #[error("malformed task payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame exceeds [`crate::protocol::MAX_FRAME_LEN`].
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// Underlying stream failure while reading or writing a frame.
    #[error("stream I/O error: {0}")]
    Stream(#[from] std::io::Error),

    /// Filesystem failure with the path it happened at.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProtocolError {
    /// True when the error concerns a single payload and the stream is still aligned.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::Json(_) | ProtocolError::InvalidPath { .. })
    }
}

/// Convenience constructor for [`ProtocolError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ProtocolError {
    ProtocolError::Io {
        path: path.into(),
        source,
    }
}
