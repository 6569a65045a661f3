//! Subject paste.
//!
//! Copies the monthly source reports into their sheets of the master
//! workbook. Runs in three phases so nothing is written unless every source
//! and every destination checks out:
//!
//! 1. every task's source file is located and checked; all failures are
//!    reported together,
//! 2. every destination sheet is resolved in the master workbook,
//! 3. each task clears its destination block and writes the cropped source.

mod locate;
mod tasks;

use std::path::PathBuf;

use ledgergrid_engine::{Sheet, Workbook};
use ledgergrid_io::xlsx::{self, Grid};

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::locator::find_any_by_exact_normalized;
use crate::model::PasteSummary;
use crate::period::{self, MAKE_LABEL};
use crate::save;
use crate::schema::column_letter;

pub use locate::{check_ledger_date_limit, find_module_file};
pub use tasks::{default_tasks, PasteTask, Selection, SourceCheck};

const TASK: &str = "subject paste";

/// Where sources come from and where they go.
#[derive(Debug, Clone)]
pub struct PasteRequest {
    /// Folder holding the `<MM>月` month folders.
    pub input_root: PathBuf,
    pub make: String,
    /// Vendor prefix for fallback file names (`<vendor>_<module>`).
    pub vendor: String,
    pub master: PathBuf,
}

/// Phase 1: locate and check every source, collecting every failure.
pub fn validate_sources(req: &PasteRequest, tasks: &[PasteTask], ctx: &RunContext) -> Result<()> {
    let mut failures = Vec::new();
    let mut checked: Vec<(&str, Option<SourceCheck>)> = Vec::new();

    for task in tasks {
        let key = (task.module.as_str(), task.check);
        if checked.contains(&key) {
            continue;
        }
        checked.push(key);
        ctx.check(TASK)?;

        let outcome = find_module_file(&req.input_root, &req.make, &req.vendor, &task.module).and_then(|path| {
            match task.check {
                Some(SourceCheck::LedgerDate) => check_ledger_date_limit(&path, &req.make, ctx),
                None => Ok(()),
            }
        });
        match outcome {
            Ok(()) => {}
            Err(e @ Error::Cancelled(_)) => return Err(e),
            Err(e) => {
                ctx.log(format!("[{}] failed its check: {e}", task.module));
                failures.push(format!("- [{}] {e}", task.module));
            }
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    Err(Error::Validation(format!(
        "{} source checks failed; nothing was pasted:\n{}",
        failures.len(),
        failures.join("\n")
    )))
}

/// Phase 2: the destination sheet index of every task, in task order.
pub fn resolve_destinations(wb: &Workbook, tasks: &[PasteTask]) -> Result<Vec<usize>> {
    let mut found = Vec::with_capacity(tasks.len());
    let mut missing: Vec<&str> = Vec::new();
    for task in tasks {
        match find_any_by_exact_normalized(wb, &task.sheet) {
            Some(idx) => found.push(idx),
            None if !missing.contains(&task.sheet.as_str()) => missing.push(&task.sheet),
            None => {}
        }
    }
    if missing.is_empty() {
        return Ok(found);
    }
    Err(Error::Validation(format!(
        "the master workbook is missing sheets; nothing was pasted:\n{}",
        missing.iter().map(|s| format!("  sheet [{s}]")).collect::<Vec<_>>().join("\n")
    )))
}

/// Clear the destination block, then write `block` at `(dest_row, dest_col)`.
///
/// The cleared block spans the block's width (capped at `limit`) and every
/// row from `dest_row` down to the sheet's last row. Styles stay. Returns
/// the number of rows written.
pub fn write_block(sheet: &mut Sheet, block: &Grid, dest_row: usize, dest_col: usize, limit: Option<usize>) -> usize {
    let width = block.iter().map(Vec::len).max().unwrap_or(0);
    if width > 0 {
        let mut last_col = dest_col + width - 1;
        if let Some(limit) = limit {
            last_col = last_col.min(limit);
        }
        for r in dest_row..=sheet.max_row() {
            for c in dest_col..=last_col {
                sheet.clear_value(r, c);
            }
        }
    }

    for (i, row) in block.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            let col = dest_col + j;
            if limit.is_some_and(|limit| col > limit) {
                break;
            }
            sheet.set_value(dest_row + i, col, value.clone());
        }
    }
    block.len()
}

/// Phase 3 on an already opened master workbook.
pub fn run_tasks(
    wb: &mut Workbook,
    req: &PasteRequest,
    tasks: &[PasteTask],
    destinations: &[usize],
    ctx: &RunContext,
) -> Result<PasteSummary> {
    let mut summary = PasteSummary { master: req.master.clone(), ..PasteSummary::default() };

    for (task, &idx) in tasks.iter().zip(destinations) {
        ctx.check(TASK)?;
        let path = match find_module_file(&req.input_root, &req.make, &req.vendor, &task.module) {
            Ok(path) => path,
            Err(Error::NotFound(msg)) => {
                log::warn!("[{}] source vanished: {msg}", task.module);
                ctx.log(format!("[{}] source file is gone, skipped", task.module));
                summary.tasks_skipped.push(task.module.clone());
                continue;
            }
            Err(e) => return Err(e),
        };

        let grid = xlsx::read_first_sheet_grid(&path)?;
        let block = task.selection.apply(&grid, &task.module)?;
        let Some(sheet) = wb.sheet_mut(idx) else { continue };
        let rows = write_block(sheet, &block, task.dest_row, task.dest_col, task.selection.column_limit());

        let width = block.iter().map(Vec::len).max().unwrap_or(0);
        let last_col = task.dest_col + width.saturating_sub(1);
        let last_col = task.selection.column_limit().map_or(last_col, |limit| last_col.min(limit));
        ctx.log(format!(
            "[{}] → '{}': {rows} rows ({}{}:{}{})",
            task.module,
            sheet.name,
            column_letter(task.dest_col),
            task.dest_row,
            column_letter(last_col),
            task.dest_row + rows.saturating_sub(1),
        ));
        summary.tasks_run += 1;
        summary.rows_written += rows;
    }
    Ok(summary)
}

/// All three phases, saving the master workbook in place.
pub fn paste_reports(req: &PasteRequest, tasks: &[PasteTask], ctx: &RunContext) -> Result<PasteSummary> {
    period::parse(&req.make, MAKE_LABEL)?;
    validate_sources(req, tasks, ctx)?;
    ctx.log("all source files passed their checks");

    if !req.master.is_file() {
        return Err(Error::NotFound(format!(
            "master workbook not found: {}",
            req.master.display()
        )));
    }
    save::ensure_in_place_target(&req.master)?;
    ctx.log(format!("loading {}", req.master.display()));
    let mut wb = xlsx::load(&req.master)?;
    let destinations = resolve_destinations(&wb, tasks)?;

    let mut summary = run_tasks(&mut wb, req, tasks, &destinations, ctx).inspect_err(|e| {
        ctx.log(format!("paste failed, workbook not saved: {e}"));
    })?;
    ctx.check(TASK)?;
    save::save_in_place(&wb, &req.master)?;

    summary.message = format!(
        "subject paste finished: {} reports pasted, {} rows written",
        summary.tasks_run, summary.rows_written
    );
    ctx.log(&summary.message);
    Ok(summary)
}

/// [`paste_reports`] with the standard task table.
pub fn paste_file(req: &PasteRequest, ctx: &RunContext) -> Result<PasteSummary> {
    paste_reports(req, &default_tasks(), ctx)
}
