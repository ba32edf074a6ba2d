use std::collections::BTreeSet;

use crate::diff::Delta;
use crate::util::{self, PathStyle};

/// Name of the archive entry holding the serialized [`Delta`].
pub const METADATA_ENTRY: &str = "metadata.json";

/// Check the structural invariants of a delta read back from an archive.
/// Returns a human-readable reason on the first violation. `style` decides
/// which stored paths are safe to resolve on this side.
pub fn validate_metadata(delta: &Delta, style: PathStyle) -> Result<(), String> {
    if let Some(path) = delta.removed.intersection(&delta.added).next() {
        return Err(format!("path listed as both removed and added: {path}"));
    }
    if let Some(path) = delta.removed.intersection(&delta.changed).next() {
        return Err(format!("path listed as both removed and changed: {path}"));
    }
    if let Some(path) = delta.added.intersection(&delta.changed).next() {
        return Err(format!("path listed as both added and changed: {path}"));
    }

    let payload: BTreeSet<&String> = delta.payload_paths().collect();
    let digested: BTreeSet<&String> = delta.file_digests.keys().collect();
    if payload != digested {
        return Err("digest map does not cover exactly the added and changed paths".to_string());
    }

    let all_paths = delta.removed.iter().chain(delta.payload_paths());
    for path in all_paths {
        if !util::is_safe_relative(path, style) {
            return Err(format!("unsafe path in metadata: {path}"));
        }
        if path == METADATA_ENTRY {
            return Err(format!("payload path collides with metadata entry: {path}"));
        }
    }

    Ok(())
}
