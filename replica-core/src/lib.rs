//! Replica core library: sync task model, attribute flags and the wire protocol.
//!
//! - [`types`]: [`SyncTask`], [`RelativePath`], [`Attributes`]
//! - [`attributes`]: reading and applying attribute flags on disk
//! - [`protocol`]: length-prefixed JSON framing shared by both agents
//! - [`error`]: [`ProtocolError`]

pub mod attributes;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{
    decode_task, encode_frame, encode_task, read_frame, write_encoded_frame, write_frame,
    DEFAULT_PORT, MAX_FRAME_LEN,
};
pub use types::{Attributes, RelativePath, SyncTask};
