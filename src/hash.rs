use std::io::BufReader;
use std::path::Path;

use crate::error::{PatchError, Result};
use crate::state::State;

/// Read buffer used when streaming file content into the hasher.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Length of every digest string (hex-encoded BLAKE3).
pub const DIGEST_HEX_LEN: usize = 64;

/// Stream-hash a file using BLAKE3 and return the hex digest.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|e| PatchError::io(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut reader, &mut hasher).map_err(|e| PatchError::io(path, e))?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hex BLAKE3 digest of an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Aggregate fingerprint of a whole state.
///
/// Entries are folded in byte order of their paths. Each path is length
/// prefixed so that distinct mappings can never concatenate to the same
/// input stream.
pub fn fingerprint(state: &State) -> String {
    let mut hasher = blake3::Hasher::new();
    for (path, digest) in state.iter() {
        hasher.update(&(path.len() as u64).to_le_bytes());
        hasher.update(path.as_bytes());
        hasher.update(&(digest.len() as u64).to_le_bytes());
        hasher.update(digest.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
