use std::path::PathBuf;

/// Errors raised while scanning, diffing, packaging or applying patches.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A single file or directory could not be read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is missing, unreadable, or carries bad metadata.
    #[error("invalid patch archive {}: {reason}", .path.display())]
    InvalidArchive { path: PathBuf, reason: String },

    /// The target matches neither end of the patch.
    #[error(
        "target state {current} matches neither the patch source {expected_source} nor its target {expected_target}"
    )]
    StateMismatch {
        current: String,
        expected_source: String,
        expected_target: String,
    },

    /// A file named by the delta disappeared from the source tree.
    #[error("source file missing while creating patch: {0}")]
    SourceMissing(String),

    /// Extracted bytes do not hash to the digest recorded in the patch.
    #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("path collides with the reserved metadata entry: {0}")]
    ReservedPath(String),

    #[error("path escapes the tree root or is malformed: {0}")]
    UnsafePath(String),
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_archive(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PatchError::InvalidArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn zip(path: impl Into<PathBuf>, err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(source) => PatchError::io(path, source),
            other => PatchError::io(path, std::io::Error::other(other)),
        }
    }

    /// True when the error means "the file is not there right now".
    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
