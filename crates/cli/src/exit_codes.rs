//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args)                                |
//! | 3    | One or more batches rejected (outputs were still written) |
//! | 4    | A view's selection was empty under `fail` policy          |
//! | 5    | Invalid config                                            |
//! | 6    | Runtime error (file IO, unreadable catalog or state)      |

use iconlabels_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Batches were rejected and skipped. Views reflect the accepted batches only.
pub const EXIT_REJECTED: u8 = 3;

/// Empty selection with `on_empty_selection = "fail"` (or `--strict`).
pub const EXIT_EMPTY_SELECTION: u8 = 4;

/// Config parse or validation error.
pub const EXIT_INVALID_CONFIG: u8 = 5;

/// IO error, unreadable catalog / state file, serialization failure.
pub const EXIT_RUNTIME: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::DuplicateBatch(_) => EXIT_INVALID_CONFIG,
        ReconError::InvalidBatch { .. } => EXIT_REJECTED,
        ReconError::EmptySelection { .. } => EXIT_EMPTY_SELECTION,
        ReconError::Parse { .. } | ReconError::Serialize(_) | ReconError::Io(_) => EXIT_RUNTIME,
    }
}
