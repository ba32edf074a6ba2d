//! Content-addressed directory snapshots and integrity-checked patch archives.
//!
//! [`state::scan`] captures a tree as a map of relative path to BLAKE3
//! digest, [`diff::diff`] derives the delta between two such states,
//! [`create::create_archive`] packages the delta into a zip archive and
//! [`apply::apply_patch`] replays it onto a target that must match the
//! delta's source (or already match its target).

pub mod apply;
pub mod create;
pub mod diff;
pub mod error;
pub mod hash;
pub mod logging;
pub mod patch_format;
pub mod state;
pub mod util;

pub use apply::{apply_patch, read_delta, ApplyOutcome, ApplyReport, Postcondition};
pub use create::{create_archive, create_patch, CreateSummary};
pub use diff::{diff, Delta};
pub use error::{PatchError, Result};
pub use state::{scan, ScanOptions, State};
pub use util::PathStyle;
