//! Initial recursive scan of the source tree.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use replica_core::RelativePath;

use crate::error::{io_err, ClientError};
use crate::queue::{PendingOp, SyncQueue};

/// Entries found under a root, relative to it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Directories, every parent before its children.
    pub dirs: Vec<RelativePath>,
    /// Regular files.
    pub files: Vec<RelativePath>,
}

/// Breadth-first listing of `root`.
///
/// Unreadable or vanished entries are logged and skipped. Only a missing or
/// unreadable root is an error.
pub fn scan_tree(root: &Path) -> Result<ScanResult, ClientError> {
    let mut result = ScanResult::default();
    let mut dirs = vec![root.to_path_buf()];
    let mut cursor = 0;

    while cursor < dirs.len() {
        let current = dirs[cursor].clone();
        cursor += 1;
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if cursor == 1 => return Err(io_err(root, err)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(dir = %current.display(), "directory vanished during scan");
                continue;
            }
            Err(err) => {
                tracing::warn!(dir = %current.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(dir = %current.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            let ty = match entry.file_type() {
                Ok(ty) => ty,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping entry without type");
                    continue;
                }
            };
            let rel = match RelativePath::from_fs_path(root, &path) {
                Ok(rel) => rel,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping entry");
                    continue;
                }
            };
            if ty.is_dir() {
                result.dirs.push(rel);
                dirs.push(path);
            } else if ty.is_file() {
                result.files.push(rel);
            } else {
                tracing::debug!(path = %path.display(), "skipping special entry");
            }
        }
    }

    Ok(result)
}

/// Enqueue one `ScanDir` per directory, then one `ScanFile` per file.
///
/// Returns the number of ops enqueued.
pub fn seed_queue(scan: ScanResult, queue: &SyncQueue) -> usize {
    let mut enqueued = 0;
    let ops = scan
        .dirs
        .into_iter()
        .map(PendingOp::ScanDir)
        .chain(scan.files.into_iter().map(PendingOp::ScanFile));
    for op in ops {
        if !queue.enqueue(op) {
            break;
        }
        enqueued += 1;
    }
    enqueued
}
