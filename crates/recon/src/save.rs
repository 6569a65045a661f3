//! Where and how services write workbooks back.
//!
//! Workbooks are always written as `.xlsx`; macro-enabled or legacy inputs
//! cannot be overwritten in place.

use std::path::{Path, PathBuf};

use ledgergrid_engine::Workbook;

use crate::error::{Error, Result};

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// `<dir>/<stem><suffix>.xlsx` next to `path`.
pub fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}.xlsx"))
}

/// Refuse to overwrite anything but an `.xlsx` file.
pub fn ensure_in_place_target(path: &Path) -> Result<()> {
    if is_xlsx(path) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "'{}' cannot be saved in place; only .xlsx workbooks can be overwritten",
            path.display()
        )))
    }
}

pub fn save_to(wb: &Workbook, path: &Path) -> Result<()> {
    ledgergrid_io::xlsx::save(wb, path)?;
    Ok(())
}

pub fn save_in_place(wb: &Workbook, path: &Path) -> Result<()> {
    ensure_in_place_target(path)?;
    save_to(wb, path)
}
