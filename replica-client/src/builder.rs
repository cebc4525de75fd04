//! Task builder: turns a [`PendingOp`] into a [`SyncTask`].
//!
//! Creates and changes are resolved against the disk when the consumer
//! reaches them, not when they were enqueued. Renames and deletes carry
//! everything they need and never touch the disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use replica_core::{Attributes, RelativePath, SyncTask};

use crate::error::{io_err, ClientError};
use crate::queue::{ChangeEvent, PendingOp};

#[derive(Debug, Clone)]
pub struct TaskBuilder {
    root: PathBuf,
}

impl TaskBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the task for `op`.
    ///
    /// `Ok(None)` means there is nothing to send: the entry vanished before
    /// the consumer reached it, or it is neither a file nor a directory.
    pub async fn build(&self, op: PendingOp) -> Result<Option<SyncTask>, ClientError> {
        match op {
            PendingOp::ScanDir(path)
            | PendingOp::ScanFile(path)
            | PendingOp::Live(ChangeEvent::Created(path))
            | PendingOp::Live(ChangeEvent::Changed(path)) => self.snapshot(path).await,
            PendingOp::Live(ChangeEvent::Renamed { from, to }) => Ok(Some(SyncTask::Rename {
                from_relative_path: from,
                to_relative_path: to,
            })),
            PendingOp::Live(ChangeEvent::Deleted(path)) => {
                Ok(Some(SyncTask::Delete { relative_path: path }))
            }
        }
    }

    async fn snapshot(&self, relative_path: RelativePath) -> Result<Option<SyncTask>, ClientError> {
        let path = relative_path.to_fs_path(&self.root);

        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %relative_path, "entry vanished before sync, skipping");
                return Ok(None);
            }
            Err(err) => return Err(io_err(&path, err)),
        };
        let attributes = Attributes::from_metadata(relative_path.file_name(), &metadata);

        if metadata.is_dir() {
            return Ok(Some(SyncTask::AddDir {
                relative_path,
                attributes,
            }));
        }

        if !metadata.is_file() {
            tracing::debug!(path = %relative_path, "not a regular file or directory, skipping");
            return Ok(None);
        }

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %relative_path, "file vanished before read, skipping");
                return Ok(None);
            }
            Err(err) => return Err(io_err(&path, err)),
        };

        Ok(Some(SyncTask::AddFile {
            relative_path,
            attributes,
            content,
        }))
    }
}
