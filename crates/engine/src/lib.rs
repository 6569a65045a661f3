//! In-memory workbook model: sheets, cells, styles.
//!
//! No formula evaluation happens here; formula cells carry the result the
//! authoring application cached.

pub mod cell;
pub mod sheet;
pub mod workbook;

pub use cell::{Cell, CellStyle, CellValue};
pub use sheet::{MergedRange, Sheet, Visibility};
pub use workbook::Workbook;
