//! Applies decoded [`SyncTask`]s to the destination tree.
//!
//! Each task is applied on its own: no rollback, no retry, no grouping.

use std::path::{Path, PathBuf};

use replica_core::attributes;
use replica_core::{Attributes, RelativePath, SyncTask};

use crate::error::{io_err, ServerError};

#[derive(Debug, Clone)]
pub struct TaskApplier {
    root: PathBuf,
}

impl TaskApplier {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            root: destination_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn apply(&self, task: &SyncTask) -> Result<(), ServerError> {
        match task {
            SyncTask::AddFile {
                relative_path,
                attributes,
                content,
            } => self.add_file(relative_path, *attributes, content).await,
            SyncTask::AddDir {
                relative_path,
                attributes,
            } => self.add_dir(relative_path, *attributes).await,
            SyncTask::Rename {
                from_relative_path,
                to_relative_path,
            } => self.rename(from_relative_path, to_relative_path).await,
            SyncTask::Delete { relative_path } => self.delete(relative_path).await,
        }
    }

    /// Overwrite the file; its parent must already exist.
    async fn add_file(
        &self,
        relative_path: &RelativePath,
        attrs: Attributes,
        content: &[u8],
    ) -> Result<(), ServerError> {
        let path = relative_path.to_fs_path(&self.root);
        attributes::clear_read_only(&path).await?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_err(&path, e))?;
        attributes::apply(&path, attrs).await?;
        tracing::debug!(path = %relative_path, bytes = content.len(), attributes = %attrs, "file written");
        Ok(())
    }

    /// Create the directory and any missing parents; existing is fine.
    async fn add_dir(&self, relative_path: &RelativePath, attrs: Attributes) -> Result<(), ServerError> {
        let path = relative_path.to_fs_path(&self.root);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        attributes::apply(&path, attrs).await?;
        tracing::debug!(path = %relative_path, attributes = %attrs, "directory ensured");
        Ok(())
    }

    async fn rename(&self, from: &RelativePath, to: &RelativePath) -> Result<(), ServerError> {
        let source = from.to_fs_path(&self.root);
        let target = to.to_fs_path(&self.root);
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| io_err(&source, e))?;
        tracing::debug!(from = %from, to = %to, "entry renamed");
        Ok(())
    }

    /// Remove a file, or an empty directory.
    async fn delete(&self, relative_path: &RelativePath) -> Result<(), ServerError> {
        let path = relative_path.to_fs_path(&self.root);
        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| io_err(&path, e))?;
        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| io_err(&path, e))?;
        tracing::debug!(path = %relative_path, "entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rel(s: &str) -> RelativePath {
        RelativePath::parse(s).expect("path")
    }

    fn add_file(path: &str, content: &[u8]) -> SyncTask {
        SyncTask::AddFile {
            relative_path: rel(path),
            attributes: Attributes::NORMAL,
            content: content.to_vec(),
        }
    }

    #[tokio::test]
    async fn add_file_overwrites_existing_content() {
        let dest = TempDir::new().expect("dest");
        fs::write(dest.path().join("a.txt"), "a much longer old body").expect("seed");
        let applier = TaskApplier::new(dest.path());

        applier.apply(&add_file("a.txt", b"hi")).await.expect("apply");
        assert_eq!(fs::read(dest.path().join("a.txt")).expect("read"), b"hi");
    }

    #[tokio::test]
    async fn add_file_does_not_create_parents() {
        let dest = TempDir::new().expect("dest");
        let applier = TaskApplier::new(dest.path());

        let err = applier
            .apply(&add_file("missing/a.txt", b"x"))
            .await
            .expect_err("parent missing");
        assert!(matches!(err, ServerError::Io { .. }));
        assert!(!dest.path().join("missing").exists());
    }

    #[tokio::test]
    async fn add_file_replaces_read_only_file_and_keeps_flag() {
        let dest = TempDir::new().expect("dest");
        let applier = TaskApplier::new(dest.path());
        let locked = SyncTask::AddFile {
            relative_path: rel("locked.txt"),
            attributes: Attributes::NORMAL | Attributes::READ_ONLY,
            content: b"v1".to_vec(),
        };
        applier.apply(&locked).await.expect("first write");

        let updated = SyncTask::AddFile {
            relative_path: rel("locked.txt"),
            attributes: Attributes::NORMAL | Attributes::READ_ONLY,
            content: b"v2".to_vec(),
        };
        applier.apply(&updated).await.expect("overwrite");

        let path = dest.path().join("locked.txt");
        assert_eq!(fs::read(&path).expect("read"), b"v2");
        assert!(fs::metadata(&path).expect("meta").permissions().readonly());
    }

    #[tokio::test]
    async fn add_dir_creates_parents_and_is_idempotent() {
        let dest = TempDir::new().expect("dest");
        let applier = TaskApplier::new(dest.path());
        let task = SyncTask::AddDir {
            relative_path: rel("x/y/z"),
            attributes: Attributes::DIRECTORY,
        };

        applier.apply(&task).await.expect("first");
        applier.apply(&task).await.expect("second");
        assert!(dest.path().join("x/y/z").is_dir());
    }

    #[tokio::test]
    async fn read_only_flag_on_directory_does_not_block_its_children() {
        let dest = TempDir::new().expect("dest");
        let applier = TaskApplier::new(dest.path());

        applier
            .apply(&SyncTask::AddDir {
                relative_path: rel("b"),
                attributes: Attributes::DIRECTORY | Attributes::READ_ONLY,
            })
            .await
            .expect("add dir");
        assert!(!fs::metadata(dest.path().join("b"))
            .expect("meta")
            .permissions()
            .readonly());

        applier.apply(&add_file("b/x.txt", b"child")).await.expect("child file");
        assert_eq!(fs::read(dest.path().join("b/x.txt")).expect("read"), b"child");
    }

    #[tokio::test]
    async fn rename_then_delete_of_old_path_fails() {
        let dest = TempDir::new().expect("dest");
        fs::write(dest.path().join("old.txt"), "body").expect("seed");
        let applier = TaskApplier::new(dest.path());

        applier
            .apply(&SyncTask::Rename {
                from_relative_path: rel("old.txt"),
                to_relative_path: rel("new.txt"),
            })
            .await
            .expect("rename");
        assert_eq!(fs::read(dest.path().join("new.txt")).expect("read"), b"body");

        let err = applier
            .apply(&SyncTask::Delete {
                relative_path: rel("old.txt"),
            })
            .await
            .expect_err("old path is gone");
        assert!(matches!(err, ServerError::Io { .. }));
        assert!(dest.path().join("new.txt").exists());

        applier
            .apply(&SyncTask::Delete {
                relative_path: rel("new.txt"),
            })
            .await
            .expect("delete final path");
        assert!(!dest.path().join("old.txt").exists());
        assert!(!dest.path().join("new.txt").exists());
    }

    #[tokio::test]
    async fn delete_directory_is_not_recursive() {
        let dest = TempDir::new().expect("dest");
        fs::create_dir_all(dest.path().join("full")).expect("mkdir");
        fs::write(dest.path().join("full/inner.txt"), "x").expect("seed");
        fs::create_dir(dest.path().join("empty")).expect("mkdir");
        let applier = TaskApplier::new(dest.path());

        assert!(applier
            .apply(&SyncTask::Delete {
                relative_path: rel("full"),
            })
            .await
            .is_err());
        assert!(dest.path().join("full/inner.txt").exists());

        applier
            .apply(&SyncTask::Delete {
                relative_path: rel("empty"),
            })
            .await
            .expect("delete empty dir");
        assert!(!dest.path().join("empty").exists());
    }
}
