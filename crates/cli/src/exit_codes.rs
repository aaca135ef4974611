//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Scripts that schedule monthly runs branch on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args, missing file) |
//! | 3-9     | recon      | Reconciliation-specific codes            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` / `ingest_exit_code`

use tally_io::IngestError;
use tally_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable config file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (3-9)
// =============================================================================

/// Config failed to parse or validate.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// An input file could not be read or decoded.
pub const EXIT_RECON_INGEST: u8 = 4;

/// No usable table, or a required column could not be located.
pub const EXIT_RECON_SCHEMA: u8 = 5;

/// Anything else during a run (output write failures, plan mismatch).
pub const EXIT_RECON_RUNTIME: u8 = 6;

// =============================================================================
// Error mapping
// =============================================================================

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::SheetNotFound { .. }
        | ReconError::NoTableFound { .. }
        | ReconError::SchemaNotFound { .. } => EXIT_RECON_SCHEMA,
        ReconError::PlanMismatch { .. } => EXIT_RECON_RUNTIME,
    }
}

/// Map an ingestion error to its exit code.
pub fn ingest_exit_code(err: &IngestError) -> u8 {
    match err {
        IngestError::UnsupportedExtension(_) => EXIT_USAGE,
        IngestError::Unreadable { .. }
        | IngestError::Workbook { .. }
        | IngestError::NoSheets(_)
        | IngestError::Io { .. } => EXIT_RECON_INGEST,
    }
}
