use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::diff::{self, Delta};
use crate::error::{PatchError, Result};
use crate::hash::CHUNK_SIZE;
use crate::patch_format::METADATA_ENTRY;
use crate::state::{self, ScanOptions};
use crate::util::{self, PathStyle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSummary {
    pub files_added: usize,
    pub files_modified: usize,
    pub files_deleted: usize,
    pub archive_bytes: u64,
}

/// Hashes everything read through it so the payload can be checked against
/// the digest the delta recorded.
struct HashingReader<R> {
    inner: R,
    hasher: blake3::Hasher,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

fn partial_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Scan `old_dir` and `new_dir`, diff them and package the delta, reading
/// payload bytes from `new_dir`.
pub fn create_patch(
    old_dir: &Path,
    new_dir: &Path,
    output: &Path,
    options: &ScanOptions,
) -> Result<(Delta, CreateSummary)> {
    let old_state = state::scan(old_dir, options)?;
    let new_state = state::scan(new_dir, options)?;
    let delta = diff::diff(&old_state, &new_state);
    let summary = create_archive(new_dir, output, &delta, options.style)?;
    Ok((delta, summary))
}

/// Write a patch archive for `delta`, copying every added and changed file
/// from `source_root`.
///
/// The archive is assembled next to `archive_path` and moved into place only
/// once complete, so a failure never leaves a truncated archive behind.
pub fn create_archive(
    source_root: &Path,
    archive_path: &Path,
    delta: &Delta,
    style: PathStyle,
) -> Result<CreateSummary> {
    for path in delta.removed.iter().chain(delta.payload_paths()) {
        if !util::is_safe_relative(path, style) {
            return Err(PatchError::UnsafePath(path.clone()));
        }
    }
    if let Some(path) = delta.payload_paths().find(|p| p.as_str() == METADATA_ENTRY) {
        return Err(PatchError::ReservedPath(path.clone()));
    }

    let partial = partial_path(archive_path);
    match write_archive(source_root, &partial, delta, style) {
        Ok(archive_bytes) => {
            std::fs::rename(&partial, archive_path)
                .map_err(|e| PatchError::io(archive_path, e))?;
            let summary = CreateSummary {
                files_added: delta.added.len(),
                files_modified: delta.changed.len(),
                files_deleted: delta.removed.len(),
                archive_bytes,
            };
            info!(
                archive = %archive_path.display(),
                added = summary.files_added,
                changed = summary.files_modified,
                removed = summary.files_deleted,
                bytes = archive_bytes,
                "patch archive written"
            );
            Ok(summary)
        }
        Err(err) => {
            let _ = std::fs::remove_file(&partial);
            Err(err)
        }
    }
}

fn write_archive(source_root: &Path, partial: &Path, delta: &Delta, style: PathStyle) -> Result<u64> {
    let file = File::create(partial).map_err(|e| PatchError::io(partial, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let metadata = serde_json::to_vec_pretty(delta)
        .map_err(|e| PatchError::io(partial, std::io::Error::other(e)))?;
    zip.start_file(METADATA_ENTRY, options)
        .map_err(|e| PatchError::zip(partial, e))?;
    zip.write_all(&metadata).map_err(|e| PatchError::io(partial, e))?;

    for path in delta.payload_paths() {
        let full = style.resolve(source_root, path);
        let src = match File::open(&full) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PatchError::SourceMissing(path.clone()));
            }
            Err(e) => return Err(PatchError::io(&full, e)),
        };

        zip.start_file(path.as_str(), options)
            .map_err(|e| PatchError::zip(partial, e))?;
        let mut reader = HashingReader {
            inner: BufReader::with_capacity(CHUNK_SIZE, src),
            hasher: blake3::Hasher::new(),
        };
        let copied = std::io::copy(&mut reader, &mut zip).map_err(|e| PatchError::io(&full, e))?;

        let actual = reader.hasher.finalize().to_hex().to_string();
        if let Some(expected) = delta.file_digests.get(path) {
            if *expected != actual {
                return Err(PatchError::Integrity {
                    path: path.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        debug!(path = %path, bytes = copied, "packed file");
    }

    let mut writer = zip.finish().map_err(|e| PatchError::zip(partial, e))?;
    writer.flush().map_err(|e| PatchError::io(partial, e))?;
    let bytes = std::fs::metadata(partial)
        .map_err(|e| PatchError::io(partial, e))?
        .len();
    Ok(bytes)
}
