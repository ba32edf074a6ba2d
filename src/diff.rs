use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::state::State;

/// Difference between a source and a target state.
///
/// Serialized field names match the archive metadata layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Paths present only in the source state.
    pub removed: BTreeSet<String>,
    /// Paths present only in the target state.
    pub added: BTreeSet<String>,
    /// Paths present in both states with differing digests.
    pub changed: BTreeSet<String>,
    /// Full target state, kept for diagnostics.
    #[serde(rename = "state")]
    pub final_state: State,
    /// Target digest of every added or changed path.
    #[serde(rename = "md5")]
    pub file_digests: BTreeMap<String, String>,
    #[serde(rename = "source_state")]
    pub source_fingerprint: String,
    #[serde(rename = "target_state")]
    pub target_fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaSummary {
    pub removed: usize,
    pub added: usize,
    pub changed: usize,
}

impl Delta {
    /// True when the two states were identical.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.changed.is_empty()
    }

    /// Paths whose bytes travel inside the archive, added first.
    pub fn payload_paths(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.changed.iter())
    }

    pub fn summary(&self) -> DeltaSummary {
        DeltaSummary {
            removed: self.removed.len(),
            added: self.added.len(),
            changed: self.changed.len(),
        }
    }
}

/// Compare two states. Pure; no filesystem access.
pub fn diff(source: &State, target: &State) -> Delta {
    let mut removed = BTreeSet::new();
    let mut changed = BTreeSet::new();
    for (path, digest) in source.iter() {
        match target.get(path) {
            None => {
                removed.insert(path.clone());
            }
            Some(other) if other != digest => {
                changed.insert(path.clone());
            }
            Some(_) => {}
        }
    }

    let added: BTreeSet<String> = target
        .paths()
        .filter(|path| !source.contains(path))
        .cloned()
        .collect();

    let file_digests = added
        .iter()
        .chain(changed.iter())
        .filter_map(|path| target.get(path).map(|d| (path.clone(), d.clone())))
        .collect();

    Delta {
        removed,
        added,
        changed,
        final_state: target.clone(),
        file_digests,
        source_fingerprint: source.fingerprint(),
        target_fingerprint: target.fingerprint(),
    }
}
