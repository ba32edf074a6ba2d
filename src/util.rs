use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PatchError, Result};

/// Separator convention used when translating between stored paths and the
/// filesystem. Stored paths always use `/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    Unix,
    Windows,
}

impl PathStyle {
    /// The convention of the platform we are running on.
    pub fn host() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Unix
        }
    }

    fn native_separator(self) -> char {
        match self {
            PathStyle::Unix => '/',
            PathStyle::Windows => '\\',
        }
    }

    /// Turn a host-style relative path into its stored form.
    pub fn normalize(self, raw: &str) -> String {
        match self {
            PathStyle::Unix => raw.to_string(),
            PathStyle::Windows => raw.replace('\\', "/"),
        }
    }

    /// Turn a stored path back into a host-style relative path.
    pub fn to_native(self, stored: &str) -> String {
        match self {
            PathStyle::Unix => stored.to_string(),
            PathStyle::Windows => stored.replace('/', &self.native_separator().to_string()),
        }
    }

    /// Resolve a stored path against a root directory.
    pub fn resolve(self, root: &Path, stored: &str) -> PathBuf {
        root.join(self.to_native(stored))
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        PathStyle::host()
    }
}

/// A regular file found under a scan root.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to the root, `/`-separated.
    pub relative_path: String,
    pub full_path: PathBuf,
}

/// Walk a directory tree and collect every regular file beneath it.
///
/// Anything whose absolute path contains `exclude` is skipped, and excluded
/// directories are not descended into. Entries that vanish or cannot be read
/// mid-walk are logged and omitted. Symlinks and special files are ignored.
///
/// Files whose names are not valid UTF-8 cannot be stored in a state; they
/// are skipped with a warning and are therefore invisible to fingerprints.
pub fn walk_files(root: &Path, exclude: Option<&str>, style: PathStyle) -> Result<Vec<FileEntry>> {
    let root = root
        .canonicalize()
        .map_err(|e| PatchError::io(root, e))?;
    let exclude = exclude.filter(|pattern| !pattern.is_empty());

    let mut entries = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| match exclude {
            Some(pattern) => !entry.path().to_string_lossy().contains(pattern),
            None => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let io = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("failed to read scan root"));
                return Err(PatchError::io(&root, io));
            }
            Err(err) => {
                warn!(path = ?err.path(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let full_path = entry.path().to_path_buf();
        let Ok(relative) = full_path.strip_prefix(&root) else {
            continue;
        };
        let Some(relative_str) = relative.to_str() else {
            warn!(path = %full_path.display(), "skipping non-UTF8 path");
            continue;
        };

        entries.push(FileEntry {
            relative_path: style.normalize(relative_str),
            full_path,
        });
    }

    debug!(root = %root.display(), files = entries.len(), "walked tree");
    Ok(entries)
}

/// A stored path is safe when it is relative, non-empty and never climbs out
/// of the root it is resolved against. Backslashes are only rejected for
/// [`PathStyle::Windows`], where they would act as separators.
pub fn is_safe_relative(stored: &str, style: PathStyle) -> bool {
    if stored.is_empty() || stored.starts_with('/') {
        return false;
    }
    if style == PathStyle::Windows && stored.contains('\\') {
        return false;
    }
    if stored.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return false;
    }
    Path::new(stored)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Remove directories left empty under `root`, walking upwards from `dir`.
/// Stops at the first non-empty directory and never removes `root` itself.
pub fn prune_empty_parents(root: &Path, dir: &Path) {
    let mut current = Some(dir);
    while let Some(path) = current {
        if path == root || !path.starts_with(root) {
            break;
        }
        if std::fs::remove_dir(path).is_err() {
            break;
        }
        debug!(dir = %path.display(), "removed empty directory");
        current = path.parent();
    }
}
