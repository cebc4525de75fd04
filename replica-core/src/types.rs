//! Domain types shared by the replica client and server.
//!
//! Every path that crosses the wire is a [`RelativePath`]; absolute
//! filesystem paths never leave the process that owns them.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// RelativePath
// ---------------------------------------------------------------------------

/// Root-relative, forward-slash separated path.
///
/// Always non-empty, never absolute, never contains `.` or `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Validate a wire-form relative path.
    ///
    /// Separators are `/` only; a backslash is rejected rather than
    /// reinterpreted, since on Unix it is an ordinary filename byte.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if raw.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }
        if raw.starts_with('/') {
            return Err(invalid(raw, "path is absolute"));
        }
        if raw.contains('\\') {
            return Err(invalid(raw, "path contains a backslash"));
        }
        for segment in raw.split('/') {
            match segment {
                "" => return Err(invalid(raw, "path has an empty component")),
                "." | ".." => return Err(invalid(raw, "path escapes its root")),
                _ => {}
            }
        }
        Ok(Self(raw.to_string()))
    }

    /// Express `full` relative to `root`.
    ///
    /// Built component by component. A name that cannot travel as a single
    /// segment (one holding `/` or `\`, or one that is not valid UTF-8) is
    /// rejected so that it can never alias a different destination entry.
    pub fn from_fs_path(root: &Path, full: &Path) -> Result<Self, ProtocolError> {
        let rel = full
            .strip_prefix(root)
            .map_err(|_| invalid(&full.display().to_string(), "path is outside the root"))?;

        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => {
                    let Some(part) = part.to_str() else {
                        return Err(invalid(&rel.display().to_string(), "name is not valid UTF-8"));
                    };
                    if part.contains(['/', '\\']) {
                        return Err(invalid(part, "name contains a path separator"));
                    }
                    segments.push(part);
                }
                Component::CurDir => {}
                _ => return Err(invalid(&rel.display().to_string(), "path escapes its root")),
            }
        }
        if segments.is_empty() {
            return Err(invalid(&rel.display().to_string(), "path is empty"));
        }
        Ok(Self(segments.join("/")))
    }

    /// Join this path onto `root`, component by component.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.0.split('/') {
            path.push(segment);
        }
        path
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

fn invalid(path: &str, reason: &'static str) -> ProtocolError {
    ProtocolError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = ProtocolError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<RelativePath> for String {
    fn from(p: RelativePath) -> Self {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Attribute flag bitset carried by `AddFile` and `AddDir`.
///
/// Bit values match the established wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(pub u32);

impl Attributes {
    pub const READ_ONLY: Attributes = Attributes(0x1);
    pub const HIDDEN: Attributes = Attributes(0x2);
    pub const DIRECTORY: Attributes = Attributes(0x10);
    pub const NORMAL: Attributes = Attributes(0x80);

    pub const fn empty() -> Self {
        Attributes(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Attributes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Attributes) {
        self.0 |= other.0;
    }

    pub fn is_dir(self) -> bool {
        self.contains(Self::DIRECTORY)
    }
}

impl std::ops::BitOr for Attributes {
    type Output = Attributes;

    fn bitor(self, rhs: Attributes) -> Attributes {
        Attributes(self.0 | rhs.0)
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ_ONLY, "read-only"),
            (Self::HIDDEN, "hidden"),
            (Self::DIRECTORY, "directory"),
            (Self::NORMAL, "normal"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

// ---------------------------------------------------------------------------
// SyncTask
// ---------------------------------------------------------------------------

/// One replication mutation, built once and transmitted once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncTask {
    /// Full overwrite of a file's bytes and attributes.
    AddFile {
        relative_path: RelativePath,
        attributes: Attributes,
        #[serde(with = "crate::protocol::base64_bytes")]
        content: Vec<u8>,
    },
    /// Directory must exist with the given attributes.
    AddDir {
        relative_path: RelativePath,
        attributes: Attributes,
    },
    /// Entry moved or renamed.
    Rename {
        from_relative_path: RelativePath,
        to_relative_path: RelativePath,
    },
    /// Entry removed.
    Delete { relative_path: RelativePath },
}

impl SyncTask {
    /// Wire tag of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncTask::AddFile { .. } => "addFile",
            SyncTask::AddDir { .. } => "addDir",
            SyncTask::Rename { .. } => "rename",
            SyncTask::Delete { .. } => "delete",
        }
    }

    /// Path the task acts on (the source path for renames).
    pub fn primary_path(&self) -> &RelativePath {
        match self {
            SyncTask::AddFile { relative_path, .. }
            | SyncTask::AddDir { relative_path, .. }
            | SyncTask::Delete { relative_path } => relative_path,
            SyncTask::Rename {
                from_relative_path, ..
            } => from_relative_path,
        }
    }
}

impl fmt::Display for SyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTask::AddFile {
                relative_path,
                content,
                ..
            } => write!(f, "addFile {relative_path} ({} bytes)", content.len()),
            SyncTask::AddDir { relative_path, .. } => write!(f, "addDir {relative_path}"),
            SyncTask::Rename {
                from_relative_path,
                to_relative_path,
            } => write!(f, "rename {from_relative_path} -> {to_relative_path}"),
            SyncTask::Delete { relative_path } => write!(f, "delete {relative_path}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
