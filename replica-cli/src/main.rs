//! Replica: one-way, continuous directory replication over TCP.
//!
//! # Usage
//!
//! ```text
//! replica server <destination> [port] [--bind <addr>] [--max-frame-bytes <n>]
//! replica client <source> <host> <port> [--once]
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{client::ClientArgs, server::ServerArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "replica",
    version,
    about = "Mirror a local directory tree to a remote one over TCP",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a source directory and stream every change to a server.
    Client(ClientArgs),

    /// Accept client sessions and apply their changes to a destination directory.
    Server(ServerArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Client(args) => args.run(),
        Commands::Server(args) => args.run(),
    }
}
