//! CLI Exit Code Registry
//!
//! Single source of truth for `lgrid` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad arguments, missing input file)      |
//! | 3    | Ledger and subject sheets disagree                   |
//! | 4    | Validation, period format or source content problem  |
//! | 5    | Required sheet, manifest or report not found         |
//! | 6    | Cancelled by the operator                            |
//! | 7    | Workbook could not be read or written                |

use ledgergrid_recon::Error;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options or files.
pub const EXIT_USAGE: u8 = 2;

/// Balance check found inconsistent, zero-but-kept or invalid subjects.
pub const EXIT_RECONCILIATION: u8 = 3;

/// Period order, manifest rows, layout, period format or source content.
pub const EXIT_VALIDATION: u8 = 4;

/// A sheet, manifest, month folder or source report is missing or ambiguous.
pub const EXIT_NOT_FOUND: u8 = 5;

/// `stop` was typed during `lgrid run`.
pub const EXIT_CANCELLED: u8 = 6;

/// Workbook read or write failure.
pub const EXIT_IO: u8 = 7;

/// Map a service error to its exit code.
pub fn recon_exit_code(err: &Error) -> u8 {
    match err {
        Error::NotFound(_) | Error::Ambiguous(_) => EXIT_NOT_FOUND,
        Error::Format(_) | Error::Validation(_) | Error::Content(_) => EXIT_VALIDATION,
        Error::Reconciliation(_) => EXIT_RECONCILIATION,
        Error::Cancelled(_) => EXIT_CANCELLED,
        Error::Io(_) => EXIT_IO,
    }
}
