//! CLI Exit Code Registry
//!
//! Single source of truth for `fiscalrec` exit codes. Scripts that run the
//! monthly close depend on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                   |
//! |---------|------------|-----------------------------------------------|
//! | 0       | Universal  | Success                                       |
//! | 1       | Universal  | General error (unspecified)                   |
//! | 2       | Universal  | CLI usage error (bad args, missing file)      |
//! | 60-69   | recon      | Reconciliation config, runtime and quality    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use fiscalrec_io::IoError;
use fiscalrec_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code on its own parse failures.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config could not be parsed, failed validation, or names a column the
/// input files do not have.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// Input could not be read or the report could not be written.
pub const EXIT_RECON_RUNTIME: u8 = 61;

/// Run completed but recorded data-quality warnings (`--strict` only).
pub const EXIT_RECON_QUALITY: u8 = 62;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnknownView(_)
        | ReconError::MissingField { .. } => EXIT_RECON_INVALID_CONFIG,
    }
}

/// Map an ingestion/rendering error to its exit code. Column bindings that
/// fail while reading a file are still configuration errors.
pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Recon(inner) => recon_exit_code(inner),
        _ => EXIT_RECON_RUNTIME,
    }
}
