//! Destination-side agent: accepts client sessions and applies their tasks.

pub mod applier;
mod error;
pub mod listener;
mod runtime;

pub use applier::TaskApplier;
pub use error::ServerError;
pub use listener::{handle_connection, serve, ConnectionStats};
pub use runtime::{run, start_blocking, ServerConfig};
