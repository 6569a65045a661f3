use ledgergrid_engine::CellValue;
use ledgergrid_io::xlsx::Grid;

use crate::error::{Error, Result};

/// Which part of a source report's first sheet gets pasted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The whole grid, header included.
    Full,
    /// The first `n` columns below the header row. `n` also caps the
    /// destination column.
    FirstColumns(usize),
    /// Every column but the last `k`.
    DropLast(usize),
    /// Only the last `k` columns.
    KeepLast(usize),
    /// Columns by position, negative counting from the right (`-1` is the
    /// last column). The header row is kept.
    Indices(Vec<isize>),
}

impl Selection {
    /// Highest destination column written, when capped.
    pub fn column_limit(&self) -> Option<usize> {
        match self {
            Selection::FirstColumns(n) => Some(*n),
            _ => None,
        }
    }

    /// Crop `grid` (an A1-anchored, rectangular grid).
    pub fn apply(&self, grid: &Grid, module: &str) -> Result<Grid> {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);

        match self {
            Selection::Full => Ok(grid.clone()),
            Selection::FirstColumns(n) => {
                let cols: Vec<usize> = (0..(*n).min(width)).collect();
                Ok(pick(grid.iter().skip(1), &cols))
            }
            Selection::DropLast(k) => {
                if width <= *k {
                    return Err(too_narrow(module, width, format!("more than {k} columns")));
                }
                let cols: Vec<usize> = (0..width - k).collect();
                Ok(pick(grid.iter(), &cols))
            }
            Selection::KeepLast(k) => {
                if width < *k {
                    return Err(too_narrow(module, width, format!("at least {k} columns")));
                }
                let cols: Vec<usize> = (width - k..width).collect();
                Ok(pick(grid.iter(), &cols))
            }
            Selection::Indices(indices) => {
                let cols = indices
                    .iter()
                    .map(|&i| resolve_index(i, width))
                    .collect::<Option<Vec<usize>>>()
                    .ok_or_else(|| too_narrow(module, width, format!("columns {indices:?}")))?;
                Ok(pick(grid.iter(), &cols))
            }
        }
    }
}

fn pick<'a>(rows: impl Iterator<Item = &'a Vec<CellValue>>, cols: &[usize]) -> Grid {
    rows.map(|row| cols.iter().map(|&c| row.get(c).cloned().unwrap_or_default()).collect())
        .collect()
}

fn resolve_index(index: isize, width: usize) -> Option<usize> {
    if index < 0 {
        width.checked_sub(index.unsigned_abs())
    } else {
        let i = index as usize;
        (i < width).then_some(i)
    }
}

fn too_narrow(module: &str, width: usize, needed: String) -> Error {
    Error::Content(format!("[{module}] has {width} columns; the paste needs {needed}"))
}

/// Extra validation run on a source file before anything is pasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCheck {
    /// Ledger dates must not run past the make period.
    LedgerDate,
}

/// One report pasted into one sheet of the master workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteTask {
    /// Report name; also the source file name prefix.
    pub module: String,
    /// Destination sheet in the master workbook.
    pub sheet: String,
    pub selection: Selection,
    /// 1-based top-left destination cell.
    pub dest_row: usize,
    pub dest_col: usize,
    pub check: Option<SourceCheck>,
}

impl PasteTask {
    pub fn new(module: &str, sheet: &str, selection: Selection, dest_row: usize, dest_col: usize) -> Self {
        Self {
            module: module.to_string(),
            sheet: sheet.to_string(),
            selection,
            dest_row,
            dest_col,
            check: None,
        }
    }

    pub fn with_check(mut self, check: SourceCheck) -> Self {
        self.check = Some(check);
        self
    }
}

/// The monthly report set, in paste order.
pub fn default_tasks() -> Vec<PasteTask> {
    vec![
        PasteTask::new("資產負債表", "資產負債表", Selection::FirstColumns(6), 1, 1),
        PasteTask::new("綜合損益表", "綜合損益表", Selection::FirstColumns(7), 1, 1),
        PasteTask::new("分類帳", "分類帳", Selection::Full, 1, 1).with_check(SourceCheck::LedgerDate),
        PasteTask::new("財產目錄", "財產目錄", Selection::Full, 1, 1),
        PasteTask::new("綜合損益期別表", "綜合損益表-月份比較", Selection::DropLast(2), 1, 1),
        PasteTask::new("綜合損益期別表", "綜合損益表-月份比較", Selection::KeepLast(2), 1, 26),
        PasteTask::new("綜合損益期別表", "綜合損益表-月份比較", Selection::Indices(vec![-6, -4]), 1, 30),
    ]
}
