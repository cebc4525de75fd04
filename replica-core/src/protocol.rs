//! Wire protocol: one [`SyncTask`] per length-prefixed frame.
//!
//! ```text
//! +----------------------+---------------------------------+
//! | u32 length (big-end) | JSON payload (`length` bytes)   |
//! +----------------------+---------------------------------+
//! ```
//!
//! The payload is a camelCase JSON object whose `type` field is one of
//! `addFile`, `addDir`, `rename`, `delete`. File content is base64.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::types::SyncTask;

/// Port the server listens on when none is given.
pub const DEFAULT_PORT: u16 = 5214;

/// Largest payload either side will produce or accept.
pub const MAX_FRAME_LEN: usize = 1 << 30;

const LEN_PREFIX: usize = 4;

/// Serialize a task to its JSON payload.
pub fn encode_task(task: &SyncTask) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(task)?)
}

/// Parse a JSON payload back into a task.
pub fn decode_task(payload: &[u8]) -> Result<SyncTask, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Prefix `payload` with its big-endian length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut buf = Vec::with_capacity(LEN_PREFIX + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encode `task`, write it as one frame and flush.
///
/// Returns once the frame has been handed to the stream in full.
pub async fn write_frame<W>(writer: &mut W, task: &SyncTask) -> Result<usize, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(&encode_task(task)?)?;
    write_encoded_frame(writer, &frame).await?;
    Ok(frame.len())
}

/// Write an already framed buffer from [`encode_frame`] and flush.
///
/// Any error here is a stream error; encoding failures can only come from
/// the steps before it.
pub async fn write_encoded_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame's payload.
///
/// `Ok(None)` means the peer closed the stream cleanly between frames. A
/// close part-way through a frame is an `UnexpectedEof` stream error.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        let read = reader.read(&mut len_buf[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("stream closed after {filled} of {LEN_PREFIX} length bytes"),
            )
            .into());
        }
        filled += read;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Serde adapter storing byte buffers as standard base64 strings.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
