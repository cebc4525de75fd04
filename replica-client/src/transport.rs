//! Transport from the consumer loop to the server.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::BufWriter;
use tokio::net::TcpStream;

use replica_core::{encode_frame, encode_task, write_encoded_frame, SyncTask};

use crate::error::ClientError;

/// Destination of built tasks.
///
/// `send` returns only after the task has been fully handed off, so the
/// consumer never overlaps two sends.
#[async_trait]
pub trait TaskSink: Send {
    async fn send(&mut self, task: SyncTask) -> Result<(), ClientError>;
}

/// One persistent TCP session carrying length-prefixed frames.
pub struct TcpTransport {
    addr: SocketAddr,
    stream: BufWriter<TcpStream>,
    frames: u64,
}

impl TcpTransport {
    /// Open the session. Failure here is fatal to the client.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;
        // Frames are flushed one at a time; don't let Nagle hold the tail back.
        stream
            .set_nodelay(true)
            .map_err(|source| ClientError::Connect { addr, source })?;
        tracing::info!(server = %addr, "connected to server");
        Ok(Self {
            addr,
            stream: BufWriter::new(stream),
            frames: 0,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.addr
    }

    /// Frames written so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames
    }
}

#[async_trait]
impl TaskSink for TcpTransport {
    async fn send(&mut self, task: SyncTask) -> Result<(), ClientError> {
        // Encoding failures (oversized content) reject this task only and
        // leave the stream untouched.
        let frame = encode_frame(&encode_task(&task)?)?;
        write_encoded_frame(&mut self.stream, &frame)
            .await
            .map_err(|source| ClientError::Transport {
                addr: self.addr,
                source,
            })?;
        self.frames += 1;
        tracing::debug!(task = %task, bytes = frame.len(), "frame sent");
        Ok(())
    }
}
