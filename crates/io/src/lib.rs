//! Workbook file I/O: XLSX import/export and source-report reading.

pub mod error;
pub mod xlsx;
pub mod xlsx_styles;

pub use error::IoError;
