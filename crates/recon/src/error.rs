use thiserror::Error;

use ledgergrid_io::IoError;

use crate::model::Verdict;

/// Every way a service run can fail. Messages are written for the operator.
#[derive(Debug, Error)]
pub enum Error {
    /// A sheet, manifest, folder or source file that must exist does not.
    #[error("{0}")]
    NotFound(String),

    /// More than one candidate matched where exactly one is required.
    #[error("{0}")]
    Ambiguous(String),

    /// A period code or similar token is malformed.
    #[error("{0}")]
    Format(String),

    /// Inputs are well-formed but disagree (period order, manifest rows, layout).
    #[error("{0}")]
    Validation(String),

    /// Source content is unusable (future-dated ledger rows, too few columns).
    #[error("{0}")]
    Content(String),

    /// Ledger and subject sheets disagree; the verdict carries the details.
    #[error("{}", .0.message)]
    Reconciliation(Box<Verdict>),

    #[error("{0}")]
    Cancelled(String),

    #[error(transparent)]
    Io(#[from] IoError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
