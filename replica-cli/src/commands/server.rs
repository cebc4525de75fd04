//! `replica server`: receive and apply a client's changes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use replica_core::{DEFAULT_PORT, MAX_FRAME_LEN};
use replica_server::{start_blocking, ServerConfig};

/// Arguments for `replica server`.
#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Destination directory; created when missing.
    pub destination: PathBuf,

    /// TCP port to listen on.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Largest accepted frame payload, in bytes.
    #[arg(long, default_value_t = MAX_FRAME_LEN)]
    pub max_frame_bytes: usize,
}

impl ServerArgs {
    pub fn run(self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            bail!("invalid destination directory: path is empty");
        }
        if self.destination.exists() && !self.destination.is_dir() {
            bail!(
                "invalid destination directory {}: not a directory",
                self.destination.display()
            );
        }

        start_blocking(ServerConfig {
            destination_root: self.destination,
            listen_addr: SocketAddr::new(self.bind, self.port),
            max_frame_len: self.max_frame_bytes,
        })
        .context("server exited with error")
    }
}
