//! # replica-client
//!
//! Source-side agent: scans and watches a directory tree and streams every
//! change to the server as an ordered sequence of [`SyncTask`]s.
//!
//! Call [`run`] (or [`start_blocking`]) with a [`ClientConfig`].
//!
//! [`SyncTask`]: replica_core::SyncTask

pub mod builder;
pub mod error;
pub mod queue;
mod runtime;
pub mod scan;
pub mod transport;
pub mod watcher;

pub use builder::TaskBuilder;
pub use error::ClientError;
pub use queue::{run_consumer, ChangeEvent, ConsumerStats, PendingOp, SyncQueue};
pub use runtime::{run, start_blocking, ClientConfig};
pub use transport::{TaskSink, TcpTransport};
