//! Resolving logical sheet names to sheets.
//!
//! Operators name sheets inconsistently (`1101 現金`, `1101現金`, `1101　現金`),
//! so lookups compare names with all whitespace removed.

use ledgergrid_engine::{Sheet, Workbook};

use crate::error::{Error, Result};

/// Strip every Unicode whitespace character, full-width space included.
pub fn normalize(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// First sheet whose normalized name contains `token`.
pub fn find_by_fuzzy_substring(wb: &Workbook, token: &str) -> Result<usize> {
    let token = normalize(token);
    wb.sheets()
        .iter()
        .position(|s| normalize(&s.name).contains(&token))
        .ok_or_else(|| {
            Error::NotFound(format!(
                "no sheet name contains '{}'; sheets in this workbook: {}",
                token,
                wb.sheet_names().join(", ")
            ))
        })
}

fn find_normalized(wb: &Workbook, name: &str, keep: impl Fn(&Sheet) -> bool) -> Option<usize> {
    let key = normalize(name);
    wb.sheets()
        .iter()
        .position(|s| keep(s) && normalize(&s.name) == key)
}

/// Visible sheet whose normalized name equals the normalized `name`.
pub fn find_by_exact_normalized(wb: &Workbook, name: &str) -> Option<usize> {
    find_normalized(wb, name, Sheet::is_visible)
}

/// Like [`find_by_exact_normalized`], over hidden and very hidden sheets.
pub fn find_hidden_by_exact_normalized(wb: &Workbook, name: &str) -> Option<usize> {
    find_normalized(wb, name, |s| !s.is_visible())
}

/// Like [`find_by_exact_normalized`], regardless of visibility.
pub fn find_any_by_exact_normalized(wb: &Workbook, name: &str) -> Option<usize> {
    find_normalized(wb, name, |_| true)
}
