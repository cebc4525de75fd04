//! Reading and applying [`Attributes`] on the local filesystem.

use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{io_err, ProtocolError};
use crate::types::Attributes;

impl Attributes {
    /// Derive flags for an entry named `name` from its metadata.
    ///
    /// READ_ONLY is only reported for files; a directory's write bits gate
    /// creating its children and are not part of the mirrored state.
    pub fn from_metadata(name: &str, metadata: &Metadata) -> Self {
        let mut attrs = if metadata.is_dir() {
            Attributes::DIRECTORY
        } else {
            Attributes::NORMAL
        };
        if name.starts_with('.') {
            attrs.insert(Attributes::HIDDEN);
        }
        if !metadata.is_dir() && metadata.permissions().readonly() {
            attrs.insert(Attributes::READ_ONLY);
        }
        attrs
    }
}

/// Make the file at `path` carry `attrs`.
///
/// Only the read-only bit has an on-disk counterpart here; DIRECTORY and
/// NORMAL follow from the entry type and HIDDEN from its name. Directories
/// are left writable whatever the flags say.
pub async fn apply(path: &Path, attrs: Attributes) -> Result<(), ProtocolError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_err(path, e))?;
    if metadata.is_dir() {
        return Ok(());
    }
    let mut permissions = metadata.permissions();
    let want_read_only = attrs.contains(Attributes::READ_ONLY);
    if permissions.readonly() == want_read_only {
        return Ok(());
    }
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(want_read_only);
    tokio::fs::set_permissions(path, permissions)
        .await
        .map_err(|e| io_err(path, e))
}

/// Drop the read-only bit so the entry can be overwritten.
///
/// A missing entry is not an error.
pub async fn clear_read_only(path: &Path) -> Result<(), ProtocolError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.permissions().readonly() => {
            let mut permissions = metadata.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            tokio::fs::set_permissions(path, permissions)
                .await
                .map_err(|e| io_err(path, e))
        }
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}
