use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, error, info, warn};
use zip::ZipArchive;

use crate::diff::Delta;
use crate::error::{PatchError, Result};
use crate::hash::{self, CHUNK_SIZE};
use crate::patch_format::{self, METADATA_ENTRY};
use crate::state::{self, ScanOptions};
use crate::util::{self, PathStyle};

/// How an apply call ended.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The target already had the patch's final state; nothing was touched.
    NoOpAlreadyCurrent,
    /// Removals and extractions ran. Inspect the report for per-file failures.
    Applied(ApplyReport),
}

#[derive(Debug)]
pub struct ApplyReport {
    pub removed: Vec<String>,
    /// Paths listed as removed that were already gone.
    pub missing_removals: Vec<String>,
    pub written: Vec<String>,
    pub failures: Vec<FileFailure>,
    pub postcondition: Postcondition,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.postcondition == Postcondition::Matched
    }
}

/// A file that could not be brought to its target content.
#[derive(Debug)]
pub struct FileFailure {
    pub path: String,
    pub error: PatchError,
}

/// Result of the advisory re-scan after mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postcondition {
    Matched,
    Diverged { expected: String, actual: String },
    /// The re-scan itself failed, so the result could not be checked.
    Unverified { reason: String },
}

type Archive = ZipArchive<BufReader<File>>;

fn open_archive(patch_path: &Path, style: PathStyle) -> Result<(Archive, Delta)> {
    let file = File::open(patch_path)
        .map_err(|e| PatchError::invalid_archive(patch_path, format!("cannot open: {e}")))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| PatchError::invalid_archive(patch_path, format!("not a zip archive: {e}")))?;

    let delta = read_metadata(&mut archive, patch_path, style)?;

    let missing = {
        let names: HashSet<&str> = archive.file_names().collect();
        delta
            .payload_paths()
            .find(|p| !names.contains(p.as_str()))
            .cloned()
    };
    if let Some(missing) = missing {
        return Err(PatchError::invalid_archive(
            patch_path,
            format!("payload entry missing: {missing}"),
        ));
    }

    Ok((archive, delta))
}

fn read_metadata<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    patch_path: &Path,
    style: PathStyle,
) -> Result<Delta> {
    let entry = archive
        .by_name(METADATA_ENTRY)
        .map_err(|e| PatchError::invalid_archive(patch_path, format!("no {METADATA_ENTRY}: {e}")))?;
    let delta: Delta = serde_json::from_reader(entry)
        .map_err(|e| PatchError::invalid_archive(patch_path, format!("unparsable metadata: {e}")))?;
    patch_format::validate_metadata(&delta, style)
        .map_err(|reason| PatchError::invalid_archive(patch_path, reason))?;
    Ok(delta)
}

/// Read and validate only the delta stored in a patch archive, using the
/// host path convention.
pub fn read_delta(patch_path: &Path) -> Result<Delta> {
    open_archive(patch_path, PathStyle::host()).map(|(_, delta)| delta)
}

/// Apply a patch archive to `target_dir`.
///
/// The target must currently match either the patch's source state (the
/// patch is applied) or its target state (nothing happens). Any other state
/// is refused before anything on disk is touched. Once mutation starts,
/// failures are recorded per file and the remaining files are still
/// processed.
pub fn apply_patch(target_dir: &Path, patch_path: &Path, options: &ScanOptions) -> Result<ApplyOutcome> {
    let (mut archive, delta) = open_archive(patch_path, options.style)?;
    let summary = delta.summary();
    info!(
        removed = summary.removed,
        added = summary.added,
        changed = summary.changed,
        "loaded patch"
    );

    let current = state::scan(target_dir, options)?.fingerprint();
    info!(
        current = %current,
        source = %delta.source_fingerprint,
        target = %delta.target_fingerprint,
        "scanned target"
    );

    if current == delta.target_fingerprint {
        info!("target already matches the patch result");
        return Ok(ApplyOutcome::NoOpAlreadyCurrent);
    }
    if current != delta.source_fingerprint {
        return Err(PatchError::StateMismatch {
            current,
            expected_source: delta.source_fingerprint.clone(),
            expected_target: delta.target_fingerprint.clone(),
        });
    }

    let target = target_dir
        .canonicalize()
        .map_err(|e| PatchError::io(target_dir, e))?;
    let style = options.style;

    let mut report = ApplyReport {
        removed: Vec::new(),
        missing_removals: Vec::new(),
        written: Vec::new(),
        failures: Vec::new(),
        postcondition: Postcondition::Matched,
    };

    for path in &delta.removed {
        let full = style.resolve(&target, path);
        match std::fs::remove_file(&full) {
            Ok(()) => {
                debug!(path = %path, "-");
                report.removed.push(path.clone());
                if let Some(parent) = full.parent() {
                    util::prune_empty_parents(&target, parent);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path, "file to remove is already absent");
                report.missing_removals.push(path.clone());
            }
            Err(e) => {
                error!(path = %path, error = %e, "failed to remove file");
                report.failures.push(FileFailure {
                    path: path.clone(),
                    error: PatchError::io(&full, e),
                });
            }
        }
    }

    for path in delta.payload_paths() {
        let Some(expected) = delta.file_digests.get(path) else {
            continue;
        };
        match extract_file(&mut archive, &target, path, expected, options) {
            Ok(()) => {
                debug!(path = %path, "{}", if delta.changed.contains(path) { "*" } else { "+" });
                report.written.push(path.clone());
            }
            Err(err) => {
                error!(path = %path, error = %err, "failed to extract file");
                report.failures.push(FileFailure {
                    path: path.clone(),
                    error: err,
                });
            }
        }
    }

    report.postcondition = check_postcondition(&target, &delta.target_fingerprint, options);

    info!(
        removed = report.removed.len(),
        written = report.written.len(),
        failures = report.failures.len(),
        "patch applied"
    );
    Ok(ApplyOutcome::Applied(report))
}

/// Re-scan the patched tree and compare it with the expected fingerprint.
/// Excluded paths can make the result diverge legitimately, so nothing here
/// is an error.
fn check_postcondition(target: &Path, expected: &str, options: &ScanOptions) -> Postcondition {
    let actual = match state::scan(target, options) {
        Ok(state) => state.fingerprint(),
        Err(err) => {
            warn!(
                event = "postcondition_unverified",
                error = %err,
                "could not re-scan the patched tree"
            );
            return Postcondition::Unverified {
                reason: err.to_string(),
            };
        }
    };

    if actual == expected {
        return Postcondition::Matched;
    }
    warn!(
        event = "postcondition_mismatch",
        expected = %expected,
        actual = %actual,
        "patched tree does not match the patch target state"
    );
    Postcondition::Diverged {
        expected: expected.to_string(),
        actual,
    }
}

fn extract_file(
    archive: &mut Archive,
    target: &Path,
    path: &str,
    expected: &str,
    options: &ScanOptions,
) -> Result<()> {
    let full = options.style.resolve(target, path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, e))?;
    }
    match std::fs::remove_file(&full) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(PatchError::io(&full, e)),
    }

    {
        let mut entry = archive
            .by_name(path)
            .map_err(|e| PatchError::zip(&full, e))?;
        let out = File::create(&full).map_err(|e| PatchError::io(&full, e))?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, out);
        std::io::copy(&mut entry, &mut writer).map_err(|e| PatchError::io(&full, e))?;
        writer.flush().map_err(|e| PatchError::io(&full, e))?;
    }

    let actual = hash::hash_file(&full)?;
    if actual != expected {
        return Err(PatchError::Integrity {
            path: path.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
