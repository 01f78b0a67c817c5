//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract. Scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args, clap parse failure)            |
//! | 3    | IO error (input unreadable, output or report unwritable)  |
//! | 4    | Input structure error (missing column, bad reference)     |
//! | 5    | Invalid config (TOML parse or validation)                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the relevant command

use billrate_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with the same code on its own parse failures.
pub const EXIT_USAGE: u8 = 2;

/// An input file could not be read, or the workbook/report could not be written.
pub const EXIT_IO: u8 = 3;

/// Raw table lacks a required column, or a reference table is unusable.
pub const EXIT_INVALID_INPUT: u8 = 4;

/// Config file does not parse or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 5;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::MissingRequiredField { .. } | ReconError::ReferenceTableMalformed { .. } => {
            EXIT_INVALID_INPUT
        }
    }
}
