use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellStyle, CellValue, Fill};

/// Characters Excel refuses in sheet names
pub const INVALID_SHEET_NAME_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// Excel's sheet name length limit (in UTF-16 units; CJK names fit well within it)
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Check a name against Excel's sheet naming rules
pub fn is_valid_sheet_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.encode_utf16().count() <= MAX_SHEET_NAME_LEN
        && !name.contains(INVALID_SHEET_NAME_CHARS)
        && !name.starts_with('\'')
        && !name.ends_with('\'')
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    /// Only reachable through the VBA editor in Excel
    VeryHidden,
}

/// A merged block of cells, 1-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergedRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl MergedRange {
    pub fn new(first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Self {
        Self { first_row, first_col, last_row, last_col }
    }

    /// More than one cell, with first <= last on both axes
    pub fn is_valid(&self) -> bool {
        self.first_row >= 1
            && self.first_col >= 1
            && self.first_row <= self.last_row
            && self.first_col <= self.last_col
            && (self.first_row, self.first_col) != (self.last_row, self.last_col)
    }

    pub fn overlaps(&self, other: &MergedRange) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }
}

/// A worksheet. Addresses are 1-based `(row, col)` as Excel shows them.
///
/// Cells are stored sparsely; a cell with no value and no style is not stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub visibility: Visibility,
    cells: BTreeMap<(usize, usize), Cell>,
    col_widths: BTreeMap<usize, f64>,
    /// Custom row heights in points
    #[serde(default)]
    row_heights: BTreeMap<usize, f64>,
    #[serde(default)]
    merged_ranges: Vec<MergedRange>,
}

static EMPTY: CellValue = CellValue::Empty;

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visibility: Visibility::Visible,
            cells: BTreeMap::new(),
            col_widths: BTreeMap::new(),
            row_heights: BTreeMap::new(),
            merged_ranges: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Value at `(row, col)`, `Empty` when the cell is absent
    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        self.cells.get(&(row, col)).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    pub fn style(&self, row: usize, col: usize) -> Option<&CellStyle> {
        self.cells.get(&(row, col)).and_then(|c| c.style.as_ref())
    }

    /// Set a value, keeping whatever style the cell already has
    pub fn set_value(&mut self, row: usize, col: usize, value: impl Into<CellValue>) {
        debug_assert!(row >= 1 && col >= 1, "sheet addresses are 1-based");
        let value = value.into();
        match self.cells.get_mut(&(row, col)) {
            Some(cell) => {
                cell.value = value;
                if cell.value == CellValue::Empty && cell.style.is_none() {
                    self.cells.remove(&(row, col));
                }
            }
            None if value != CellValue::Empty => {
                self.cells.insert((row, col), Cell::new(value));
            }
            None => {}
        }
    }

    /// Replace the cell outright (value and style)
    pub fn set_cell(&mut self, row: usize, col: usize, cell: Cell) {
        if cell.value == CellValue::Empty && cell.style.is_none() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), cell);
        }
    }

    pub fn set_style(&mut self, row: usize, col: usize, style: Option<CellStyle>) {
        let style = style.filter(|s| !s.is_default());
        match self.cells.get_mut(&(row, col)) {
            Some(cell) => {
                cell.style = style;
                if cell.value == CellValue::Empty && cell.style.is_none() {
                    self.cells.remove(&(row, col));
                }
            }
            None => {
                if let Some(style) = style {
                    self.cells.insert((row, col), Cell { value: CellValue::Empty, style: Some(style) });
                }
            }
        }
    }

    /// Set the fill of a cell, leaving the rest of its style alone
    pub fn set_fill(&mut self, row: usize, col: usize, fill: Fill) {
        let cell = self.cells.entry((row, col)).or_default();
        cell.style.get_or_insert_with(CellStyle::default).fill = Some(fill);
    }

    /// Clear a cell's value; its style stays
    pub fn clear_value(&mut self, row: usize, col: usize) {
        self.set_value(row, col, CellValue::Empty);
    }

    /// Highest row holding a value or a style (0 for an empty sheet)
    pub fn max_row(&self) -> usize {
        self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
    }

    /// Highest column holding a value or a style (0 for an empty sheet)
    pub fn max_col(&self) -> usize {
        self.cells.keys().map(|(_, c)| *c).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All stored cells in row-major order
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    /// Stored cells of one row, in column order
    pub fn row_cells(&self, row: usize) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .range((row, 0)..=(row, usize::MAX))
            .map(|((_, c), cell)| (*c, cell))
    }

    pub fn col_width(&self, col: usize) -> Option<f64> {
        self.col_widths.get(&col).copied()
    }

    pub fn set_col_width(&mut self, col: usize, width: f64) {
        self.col_widths.insert(col, width);
    }

    pub fn col_widths(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.col_widths.iter().map(|(c, w)| (*c, *w))
    }

    pub fn row_height(&self, row: usize) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn row_heights(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.row_heights.iter().map(|(r, h)| (*r, *h))
    }

    pub fn merged_ranges(&self) -> &[MergedRange] {
        &self.merged_ranges
    }

    /// Add a merge. Single-cell, inverted and overlapping ranges are refused.
    pub fn add_merge(&mut self, range: MergedRange) -> bool {
        if !range.is_valid() || self.merged_ranges.iter().any(|m| m.overlaps(&range)) {
            return false;
        }
        self.merged_ranges.push(range);
        true
    }

    /// Insert rows at the specified position, shifting existing rows down.
    /// Merges that straddle `at_row` grow; row heights move with their rows.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        if count == 0 {
            return;
        }
        let tail = self.cells.split_off(&(at_row, 0));
        for ((r, c), cell) in tail {
            self.cells.insert((r + count, c), cell);
        }

        let heights = self.row_heights.split_off(&at_row);
        self.row_heights.extend(heights.into_iter().map(|(r, h)| (r + count, h)));

        for m in &mut self.merged_ranges {
            if m.first_row >= at_row {
                m.first_row += count;
            }
            if m.last_row >= at_row {
                m.last_row += count;
            }
        }
    }

    /// Delete rows at the specified position, shifting remaining rows up.
    /// Merges shrink by the deleted rows and vanish once they cover one cell.
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        if count == 0 {
            return;
        }
        let end = start_row + count;
        let mut tail = self.cells.split_off(&(start_row, 0));
        let kept = tail.split_off(&(end, 0));
        for ((r, c), cell) in kept {
            self.cells.insert((r - count, c), cell);
        }

        let mut heights = self.row_heights.split_off(&start_row);
        let kept = heights.split_off(&end);
        self.row_heights.extend(kept.into_iter().map(|(r, h)| (r - count, h)));

        // rows inside the deleted band collapse onto its edges
        let first = |r: usize| if r < start_row { r } else if r >= end { r - count } else { start_row };
        let last = |r: usize| if r < start_row { r } else if r >= end { r - count } else { start_row.saturating_sub(1) };
        self.merged_ranges = self
            .merged_ranges
            .iter()
            .map(|m| MergedRange { first_row: first(m.first_row), last_row: last(m.last_row), ..*m })
            .filter(MergedRange::is_valid)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Rgb;

    #[test]
    fn absent_cells_read_as_empty() {
        let sheet = Sheet::new("Data");
        assert_eq!(sheet.value(3, 4), &CellValue::Empty);
        assert_eq!(sheet.max_row(), 0);
        assert!(sheet.is_empty());
    }

    #[test]
    fn set_value_keeps_style() {
        let mut sheet = Sheet::new("Data");
        sheet.set_fill(2, 2, Fill::solid(Rgb(0xFF0000)));
        sheet.set_value(2, 2, 5.0);
        assert_eq!(sheet.value(2, 2), &CellValue::Number(5.0));
        assert_eq!(sheet.style(2, 2).and_then(|s| s.fill), Some(Fill::solid(Rgb(0xFF0000))));

        sheet.clear_value(2, 2);
        assert_eq!(sheet.value(2, 2), &CellValue::Empty);
        assert!(sheet.style(2, 2).is_some());
    }

    #[test]
    fn clearing_unstyled_cell_removes_it() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(4, 1, "x");
        sheet.clear_value(4, 1);
        assert!(sheet.cell(4, 1).is_none());
        assert_eq!(sheet.max_row(), 0);
    }

    #[test]
    fn insert_rows_shifts_down() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(1, 1, "header");
        sheet.set_value(2, 1, "a");
        sheet.set_value(3, 1, "b");

        sheet.insert_rows(3, 1);

        assert_eq!(sheet.value(2, 1), &CellValue::text("a"));
        assert_eq!(sheet.value(3, 1), &CellValue::Empty);
        assert_eq!(sheet.value(4, 1), &CellValue::text("b"));
        assert_eq!(sheet.max_row(), 4);
    }

    #[test]
    fn delete_rows_shifts_up() {
        let mut sheet = Sheet::new("Data");
        for r in 1..=5 {
            sheet.set_value(r, 2, r as f64);
        }

        sheet.delete_rows(2, 2);

        assert_eq!(sheet.value(1, 2), &CellValue::Number(1.0));
        assert_eq!(sheet.value(2, 2), &CellValue::Number(4.0));
        assert_eq!(sheet.value(3, 2), &CellValue::Number(5.0));
        assert_eq!(sheet.max_row(), 3);
    }

    #[test]
    fn merges_and_heights_follow_inserted_rows() {
        let mut sheet = Sheet::new("Data");
        assert!(sheet.add_merge(MergedRange::new(1, 1, 1, 3)));
        assert!(sheet.add_merge(MergedRange::new(4, 1, 6, 1)));
        sheet.set_row_height(1, 40.0);
        sheet.set_row_height(5, 18.0);

        sheet.insert_rows(5, 2);

        assert_eq!(sheet.merged_ranges(), &[MergedRange::new(1, 1, 1, 3), MergedRange::new(4, 1, 8, 1)]);
        assert_eq!(sheet.row_height(1), Some(40.0));
        assert_eq!(sheet.row_height(5), None);
        assert_eq!(sheet.row_height(7), Some(18.0));
    }

    #[test]
    fn merges_and_heights_follow_deleted_rows() {
        let mut sheet = Sheet::new("Data");
        sheet.add_merge(MergedRange::new(1, 1, 1, 3));
        sheet.add_merge(MergedRange::new(3, 1, 5, 1));
        sheet.add_merge(MergedRange::new(7, 2, 8, 2));
        sheet.set_row_height(4, 30.0);
        sheet.set_row_height(8, 12.0);

        sheet.delete_rows(4, 2);

        // 3..5 loses rows 4 and 5 and becomes a single cell
        assert_eq!(sheet.merged_ranges(), &[MergedRange::new(1, 1, 1, 3), MergedRange::new(5, 2, 6, 2)]);
        assert_eq!(sheet.row_height(4), None);
        assert_eq!(sheet.row_height(6), Some(12.0));
    }

    #[test]
    fn overlapping_and_single_cell_merges_are_refused() {
        let mut sheet = Sheet::new("Data");
        assert!(sheet.add_merge(MergedRange::new(2, 2, 3, 3)));
        assert!(!sheet.add_merge(MergedRange::new(3, 3, 4, 4)));
        assert!(!sheet.add_merge(MergedRange::new(9, 9, 9, 9)));
        assert_eq!(sheet.merged_ranges().len(), 1);
    }

    #[test]
    fn row_cells_are_in_column_order() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(2, 9, "i");
        sheet.set_value(2, 1, "a");
        sheet.set_value(3, 1, "next");
        let cols: Vec<usize> = sheet.row_cells(2).map(|(c, _)| c).collect();
        assert_eq!(cols, vec![1, 9]);
    }

    #[test]
    fn sheet_name_rules() {
        assert!(is_valid_sheet_name("1101 現金"));
        assert!(!is_valid_sheet_name("a:b"));
        assert!(!is_valid_sheet_name("[x]"));
        assert!(!is_valid_sheet_name("   "));
        assert!(!is_valid_sheet_name(&"x".repeat(32)));
    }
}
