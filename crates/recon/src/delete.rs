//! Subject delete.
//!
//! Reads the manifest written by the update pass and, on each listed subject
//! sheet, removes every group of detail rows (same remark) whose two amount
//! columns cancel out.

use std::collections::HashMap;
use std::path::Path;

use ledgergrid_engine::{Sheet, Workbook};
use ledgergrid_io::xlsx;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::model::DeleteSummary;
use crate::period;
use crate::save;
use crate::schema::{ColumnSchema, DetailSchema};
use crate::update::{manifest_sheet_name, BALANCE_TOLERANCE};

const TASK: &str = "subject delete";

/// Detail rows sharing one remark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemarkGroup {
    pub rows: Vec<usize>,
    pub sum_a: f64,
    pub sum_b: f64,
}

impl RemarkGroup {
    pub fn is_settled(&self) -> bool {
        !self.rows.is_empty() && (self.sum_a - self.sum_b).abs() < BALANCE_TOLERANCE
    }
}

/// Group data rows by trimmed remark, in first-seen order. Blank or
/// non-numeric amounts count as zero.
pub fn group_by_remark(sheet: &Sheet, schema: &DetailSchema, ctx: &RunContext) -> Result<Vec<(String, RemarkGroup)>> {
    let mut groups: Vec<(String, RemarkGroup)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for r in 2..=sheet.max_row() {
        ctx.check(TASK)?;
        let remark = sheet.value(r, schema.remark).trimmed();
        if remark.is_empty() {
            continue;
        }
        let i = *index.entry(remark.clone()).or_insert_with(|| {
            groups.push((remark, RemarkGroup::default()));
            groups.len() - 1
        });
        let group = &mut groups[i].1;
        group.rows.push(r);
        group.sum_a += sheet.value(r, schema.amount_a).as_number().unwrap_or(0.0);
        group.sum_b += sheet.value(r, schema.amount_b).as_number().unwrap_or(0.0);
    }
    Ok(groups)
}

struct ManifestRow {
    row: usize,
    subject: String,
    make: String,
    latest: String,
}

fn read_manifest(sheet: &Sheet) -> Vec<ManifestRow> {
    (2..=sheet.max_row())
        .filter_map(|r| {
            let subject = sheet.value(r, 1).trimmed();
            (!subject.is_empty()).then(|| ManifestRow {
                row: r,
                subject,
                make: sheet.value(r, 2).trimmed(),
                latest: sheet.value(r, 3).trimmed(),
            })
        })
        .collect()
}

/// Delete settled remark groups from one subject sheet.
///
/// `None` when the workbook has no sheet with exactly that name.
fn clean_subject_sheet(wb: &mut Workbook, name: &str, ctx: &RunContext) -> Result<Option<usize>> {
    let Some(sheet) = wb.sheet_by_name_mut(name) else {
        ctx.log(format!("sheet '{name}' not found, skipped"));
        return Ok(None);
    };
    let schema = DetailSchema::STANDARD;
    schema.bind(sheet)?;

    let mut doomed = Vec::new();
    for (remark, group) in group_by_remark(sheet, &schema, ctx)? {
        if group.is_settled() {
            ctx.log(format!(
                "'{name}': remark '{remark}' settles ({} = {}), rows {:?}",
                group.sum_a, group.sum_b, group.rows
            ));
            doomed.extend(group.rows);
        }
    }
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    doomed.dedup();

    for &r in &doomed {
        ctx.check(TASK)?;
        sheet.delete_rows(r, 1);
    }
    ctx.log(format!("'{name}': deleted {} rows", doomed.len()));
    Ok(Some(doomed.len()))
}

/// Clean every sheet listed in the `make` manifest.
pub fn run_delete(wb: &mut Workbook, make: &str, latest: &str, ctx: &RunContext) -> Result<DeleteSummary> {
    let manifest_name = manifest_sheet_name(make);
    let manifest = wb.sheet_by_name(&manifest_name).ok_or_else(|| {
        Error::NotFound(format!(
            "manifest sheet '{manifest_name}' not found; run the subject update for {make} first"
        ))
    })?;
    ctx.log(format!("reading manifest '{manifest_name}'"));

    let rows = read_manifest(manifest);
    let mismatched: Vec<String> = rows
        .iter()
        .filter(|m| m.make != make || m.latest != latest)
        .map(|m| format!("  row {}: {} (make {}, latest {})", m.row, m.subject, m.make, m.latest))
        .collect();
    if !mismatched.is_empty() {
        return Err(Error::Validation(format!(
            "manifest '{manifest_name}' was written for other periods than make {make} / latest {latest}; \
             nothing was deleted:\n{}",
            mismatched.join("\n")
        )));
    }

    let subjects: Vec<String> = rows.into_iter().map(|m| m.subject).collect();
    if subjects.is_empty() {
        let message = format!("manifest '{manifest_name}' lists no subject sheets; nothing to delete");
        ctx.log(&message);
        return Ok(DeleteSummary { message, ..DeleteSummary::default() });
    }

    let mut summary = DeleteSummary { manifest_rows: subjects.len(), ..DeleteSummary::default() };
    for subject in subjects {
        ctx.check(TASK)?;
        match clean_subject_sheet(wb, &subject, ctx)? {
            Some(deleted) => {
                summary.sheets_processed += 1;
                summary.rows_deleted += deleted;
            }
            None => summary.skipped_sheets.push(subject),
        }
    }
    summary.message = format!(
        "subject delete finished: processed {} sheets, deleted {} rows",
        summary.sheets_processed, summary.rows_deleted
    );
    ctx.log(&summary.message);
    Ok(summary)
}

/// Run the deletion pass on a workbook file and save it in place.
pub fn delete_file(path: &Path, make: &str, latest: &str, ctx: &RunContext) -> Result<DeleteSummary> {
    if !period::is_not_before(latest, make)? {
        return Err(Error::Validation(format!(
            "make period ({make}) must not be earlier than latest period ({latest})"
        )));
    }
    save::ensure_in_place_target(path)?;

    ctx.log(format!("loading {}", path.display()));
    let mut wb = xlsx::load(path)?;
    let summary = run_delete(&mut wb, make, latest, ctx)?;
    if summary.manifest_rows > 0 {
        ctx.check(TASK)?;
        save::save_in_place(&wb, path)?;
        ctx.log(format!("saved {}", path.display()));
    }
    Ok(summary)
}
