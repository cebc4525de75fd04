//! `replica client`: mirror a local directory tree to a remote server.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use replica_client::{start_blocking, ClientConfig};

/// Arguments for `replica client`.
#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Source directory to watch and replicate.
    pub source: PathBuf,

    /// Server host name or IP address.
    pub host: String,

    /// Server TCP port.
    pub port: u16,

    /// Perform the initial sync only, then exit.
    #[arg(long)]
    pub once: bool,
}

impl ClientArgs {
    pub fn run(self) -> Result<()> {
        if !self.source.is_dir() {
            bail!(
                "invalid source directory {}: not found or not a directory",
                self.source.display()
            );
        }
        let server_addr = resolve(&self.host, self.port)?;

        let stats = start_blocking(ClientConfig {
            source_root: self.source,
            server_addr,
            once: self.once,
        })
        .context("client exited with error")?;

        if self.once {
            println!("synced {} entries ({} skipped)", stats.sent, stats.dropped);
        }
        Ok(())
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("could not resolve server host '{host}'"))?
        .next()
        .with_context(|| format!("server host '{host}' resolved to no addresses"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ip_literals_without_lookup() {
        let addr = resolve("127.0.0.1", 5214).expect("resolve");
        assert_eq!(addr, "127.0.0.1:5214".parse().expect("addr"));
    }
}
