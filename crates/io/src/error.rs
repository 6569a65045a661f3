use std::path::PathBuf;

use thiserror::Error;

/// Failures reading or writing workbook files.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read sheet '{sheet}': {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    #[error("'{}' contains no sheets", .0.display())]
    NoSheets(PathBuf),

    #[error("failed to read workbook archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Fs(#[from] std::io::Error),
}
