use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::hash;
use crate::util::{self, PathStyle};

/// Snapshot of a directory tree: stored relative path -> content digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(BTreeMap<String, String>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&String> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in byte order of their paths.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Aggregate fingerprint; equal iff the mappings are equal.
    pub fn fingerprint(&self) -> String {
        hash::fingerprint(self)
    }
}

impl FromIterator<(String, String)> for State {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        State(iter.into_iter().collect())
    }
}

/// Options shared by scanning and applying.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Literal substring; any file or directory whose absolute path contains
    /// it is left out of the state.
    pub exclude: Option<String>,
    pub style: PathStyle,
}

impl ScanOptions {
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    pub fn with_style(mut self, style: PathStyle) -> Self {
        self.style = style;
        self
    }
}

/// Capture the state of every regular file beneath `root`.
///
/// Files that disappear or become unreadable between listing and hashing
/// are treated as never having existed for this snapshot.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<State> {
    let entries = util::walk_files(root, options.exclude.as_deref(), options.style)?;

    let mut state = BTreeMap::new();
    for entry in entries {
        match hash::hash_file(&entry.full_path) {
            Ok(digest) => {
                state.insert(entry.relative_path, digest);
            }
            Err(err) => {
                warn!(path = %entry.relative_path, error = %err, "file vanished during scan");
            }
        }
    }

    info!(root = %root.display(), files = state.len(), "captured state");
    Ok(State(state))
}
