//! Subject update.
//!
//! Two passes over one workbook: [`run_check`] compares the ledger's latest
//! balance for every subject with the last balance on that subject's sheet;
//! only when every subject agrees does [`run_copy_data`] append the ledger
//! rows of the new periods to the subject sheets and record what it touched
//! in a hidden manifest sheet for the deletion pass.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use ledgergrid_engine::cell::{Fill, Rgb};
use ledgergrid_engine::{Cell, CellValue, Sheet, Visibility, Workbook};
use ledgergrid_io::xlsx;

use crate::classify::{class_code_order, classify_row, is_excluded, LedgerRow, RowClass};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::locator::{
    find_any_by_exact_normalized, find_by_exact_normalized, find_by_fuzzy_substring,
    find_hidden_by_exact_normalized, normalize,
};
use crate::model::{CopyOutcome, Details, Status, UpdateReport, Verdict};
use crate::period::{self, LATEST_LABEL, MAKE_LABEL};
use crate::save;
use crate::schema::{BalanceSchema, ColumnSchema, DetailSchema, LedgerSchema};

/// Token identifying the ledger sheet by substring.
pub const LEDGER_TOKEN: &str = "分類帳";
/// Sheet listing the subjects that get their own sheet.
pub const BALANCE_SHEET: &str = "資產負債表";
pub const MANIFEST_PREFIX: &str = "更新清單_";
pub const MANIFEST_HEADERS: [&str; 3] = ["科目代號（分頁名稱）", "製作科餘月", "最新科餘月"];
/// Balances closer than this are equal.
pub const BALANCE_TOLERANCE: f64 = 0.001;
pub const UPDATED_SUFFIX: &str = "_updated";

pub const DUPLICATE_REMARK_FILL: Rgb = Rgb(0xF6D6A8);
pub const OFFSETTING_AMOUNT_FILL: Rgb = Rgb(0xE1E5E9);

const TASK: &str = "subject update";

/// Name of the manifest sheet for a make period.
pub fn manifest_sheet_name(make: &str) -> String {
    format!("{MANIFEST_PREFIX}{make}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Write `<stem>_updated.xlsx` next to the input.
    #[default]
    Suffixed,
    InPlace,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub save_mode: SaveMode,
}

fn period_number(code: &str, label: &str) -> Result<u32> {
    period::parse(code, label)?;
    code.parse()
        .map_err(|_| Error::Format(format!("{label} is not a valid period: '{code}'")))
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Compare ledger balances up to `target` with the subject sheets.
pub fn run_check(wb: &Workbook, target: &str, ctx: &RunContext) -> Result<Verdict> {
    let target_num = period_number(target, LATEST_LABEL)?;
    let schema = LedgerSchema::STANDARD;
    let ledger = &wb.sheets()[find_by_fuzzy_substring(wb, LEDGER_TOKEN)?];
    schema.bind(ledger)?;
    ctx.log(format!("checking ledger '{}' up to period {target}", ledger.name));

    let mut rows = Vec::new();
    let mut invalid = Vec::new();
    for r in 2..=ledger.max_row() {
        match classify_row(ledger, r, &schema, target_num) {
            RowClass::InScope(row) => rows.push(row),
            RowClass::InvalidName { row, subject } => {
                ctx.log(format!("row {row}: subject '{subject}' cannot be a sheet name"));
                invalid.push(format!("row {row}: {subject}"));
            }
            RowClass::OutOfScope => {}
        }
    }
    if !invalid.is_empty() {
        return Ok(compose(target, Vec::new(), Vec::new(), invalid, ctx));
    }
    ctx.check(TASK)?;

    let mut zero_kept = Vec::new();
    let mut candidates = Vec::new();
    for row in latest_rows(rows) {
        if row.amount == 0.0 {
            if find_by_exact_normalized(wb, &row.subject).is_none() {
                log::debug!("subject '{}' has a zero balance and no sheet, dropped", row.subject);
                continue;
            }
            ctx.log(format!("subject '{}' has a zero balance but still has a sheet", row.subject));
            zero_kept.push(row.subject.clone());
        }
        candidates.push(row);
    }

    if candidates.is_empty() {
        let message = format!("no qualifying data (<= {target}) in ledger '{}'", ledger.name);
        ctx.log(&message);
        return Ok(Verdict { status: Status::Error, message, details: Details::default() });
    }

    candidates.sort_by_key(|row| class_code_order(&row.class_code));

    let mut inconsistent = Vec::new();
    for row in &candidates {
        ctx.check(TASK)?;
        if is_excluded(&row.class_code) {
            ctx.log(format!("class code {} ({}) is excluded, skipped", row.class_code, row.subject));
            continue;
        }
        let Some(idx) = find_by_exact_normalized(wb, &row.subject) else {
            ctx.log(format!("subject '{}' has no visible sheet", row.subject));
            inconsistent.push(row.subject.clone());
            continue;
        };
        let sheet = &wb.sheets()[idx];
        match last_balance(sheet, &schema) {
            Some(balance) if (row.amount - balance).abs() < BALANCE_TOLERANCE => {}
            Some(balance) => {
                ctx.log(format!(
                    "subject '{}': ledger balance {} but sheet '{}' ends at {}",
                    row.subject, row.amount, sheet.name, balance
                ));
                inconsistent.push(row.subject.clone());
            }
            None => {
                ctx.log(format!("subject '{}': sheet '{}' has no balance row", row.subject, sheet.name));
                inconsistent.push(row.subject.clone());
            }
        }
    }

    Ok(compose(target, zero_kept, inconsistent, Vec::new(), ctx))
}

/// The last in-scope row of each subject, in first-seen order.
fn latest_rows(rows: Vec<LedgerRow>) -> Vec<LedgerRow> {
    let mut latest: Vec<LedgerRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        match index.get(&row.subject) {
            Some(&i) => {
                if row.row > latest[i].row {
                    latest[i] = row;
                }
            }
            None => {
                index.insert(row.subject.clone(), latest.len());
                latest.push(row);
            }
        }
    }
    latest
}

/// Last data row with date, class code, subject and amount all filled.
fn last_filled_row(sheet: &Sheet, schema: &LedgerSchema) -> Option<usize> {
    let cols = [schema.date, schema.class_code, schema.subject, schema.amount];
    (2..=sheet.max_row())
        .rev()
        .find(|&r| cols.iter().all(|&c| sheet.value(r, c).has_text()))
}

fn last_balance(sheet: &Sheet, schema: &LedgerSchema) -> Option<f64> {
    last_filled_row(sheet, schema).and_then(|r| sheet.value(r, schema.amount).as_number())
}

fn compose(
    target: &str,
    zero_kept: Vec<String>,
    inconsistent: Vec<String>,
    invalid: Vec<String>,
    ctx: &RunContext,
) -> Verdict {
    let mut seen = HashSet::new();
    let inconsistent: Vec<String> = inconsistent
        .into_iter()
        .filter(|s| !zero_kept.contains(s))
        .filter(|s| seen.insert(s.clone()))
        .collect();

    let mut sections = Vec::new();
    if !invalid.is_empty() {
        let unique: BTreeSet<&str> = invalid.iter().map(String::as_str).collect();
        sections.push(format!(
            "These subject names contain characters that sheet names cannot use (: \\ / ? * [ ]); \
             rename them in the ledger and run again:\n  {}",
            unique.into_iter().collect::<Vec<_>>().join("、")
        ));
    }
    if !zero_kept.is_empty() {
        sections.push(format!(
            "Period {target}: these subjects have a zero ledger balance but still have a sheet; \
             check the sheet names and contents and run again:\n  {}",
            zero_kept.join("、")
        ));
    }
    if !inconsistent.is_empty() {
        sections.push(format!(
            "Period {target}: these subject sheets do not match the ledger balance; \
             check the balances or sheet names and run again:\n  {}",
            inconsistent.join("、")
        ));
    }

    let details = Details { inconsistent, zero_items_but_kept: zero_kept, invalid_items: invalid };
    let (status, message) = if details.is_empty() {
        (Status::Success, format!("Every subject sheet matches the ledger balance for period {target}."))
    } else {
        (Status::Error, sections.join("\n\n"))
    };
    ctx.log(&message);
    Verdict { status, message, details }
}

// ---------------------------------------------------------------------------
// Copy
// ---------------------------------------------------------------------------

const DEDUCTION_MARKS: [char; 2] = ['減', '减'];
const COLONS: [char; 4] = [':', '：', '︰', '﹕'];

/// Balance sheet text with whitespace and a leading `減:` style marker removed.
pub fn clean_subject_text(raw: &str) -> String {
    let text = normalize(raw);
    let mut chars = text.chars();
    if let (Some(mark), Some(colon)) = (chars.next(), chars.next()) {
        if DEDUCTION_MARKS.contains(&mark) && COLONS.contains(&colon) {
            return chars.collect();
        }
    }
    text
}

/// Subject name → class code, from both column pairs of the balance sheet.
fn subject_map(wb: &Workbook, ctx: &RunContext) -> Result<HashMap<String, String>> {
    let idx = wb
        .index_of(BALANCE_SHEET)
        .or_else(|| find_any_by_exact_normalized(wb, BALANCE_SHEET))
        .ok_or_else(|| Error::NotFound(format!("sheet '{BALANCE_SHEET}' not found")))?;
    let sheet = &wb.sheets()[idx];
    let schema = BalanceSchema::STANDARD;
    schema.bind(sheet)?;

    let mut map = HashMap::new();
    for r in 2..=sheet.max_row() {
        for &(code_col, name_col) in &schema.pairs {
            let code = clean_subject_text(&sheet.value(r, code_col).display());
            let name = clean_subject_text(&sheet.value(r, name_col).display());
            if code.starts_with(['1', '2']) && !name.is_empty() && !is_excluded(&code) {
                map.insert(name, code);
            }
        }
    }
    ctx.log(format!("'{}' lists {} subjects", sheet.name, map.len()));
    Ok(map)
}

/// Column widths and header row every new subject sheet starts from.
struct SheetTemplate {
    widths: Vec<(usize, f64)>,
    header: Vec<(usize, Cell)>,
}

impl SheetTemplate {
    fn from_ledger(ledger: &Sheet) -> Self {
        Self {
            widths: ledger.col_widths().collect(),
            header: ledger.row_cells(1).map(|(c, cell)| (c, value_copy(cell))).collect(),
        }
    }

    fn apply(&self, sheet: &mut Sheet) {
        for &(col, width) in &self.widths {
            sheet.set_col_width(col, width);
        }
        for (col, cell) in &self.header {
            sheet.set_cell(1, *col, cell.clone());
        }
    }
}

/// Copy of a cell with formulas replaced by their cached results.
fn value_copy(cell: &Cell) -> Cell {
    Cell { value: cell.value.resolved().clone(), style: cell.style.clone() }
}

struct NewRow {
    source_row: usize,
    subject: String,
    cells: Vec<(usize, Cell)>,
}

fn collect_new_rows(
    ledger: &Sheet,
    schema: &LedgerSchema,
    subjects: &HashMap<String, String>,
    latest: u32,
    make: u32,
) -> Vec<NewRow> {
    let mut rows = Vec::new();
    for r in 2..=ledger.max_row() {
        let date = ledger.value(r, schema.date).trimmed();
        let subject = ledger.value(r, schema.subject).trimmed();
        if date.is_empty() || subject.is_empty() {
            continue;
        }
        let Some(p) = period::period_of_token(&date) else { continue };
        if p <= latest || p > make || !subjects.contains_key(&subject) {
            continue;
        }
        let cells = (1..=schema.copy_width)
            .filter_map(|c| ledger.cell(r, c).map(|cell| (c, value_copy(cell))))
            .collect();
        rows.push(NewRow { source_row: r, subject, cells });
    }
    rows
}

/// Sheet that receives rows for `subject`, creating it when needed.
///
/// A visible sheet is used as is. When only a hidden sheet carries the name,
/// rows go to a visible `@<subject>` sheet instead.
fn destination_sheet(
    wb: &mut Workbook,
    subject: &str,
    template: &SheetTemplate,
    outcome: &mut CopyOutcome,
    ctx: &RunContext,
) -> Result<usize> {
    if let Some(idx) = find_by_exact_normalized(wb, subject) {
        return Ok(idx);
    }
    let name = if find_hidden_by_exact_normalized(wb, subject).is_some() {
        let alias = format!("@{subject}");
        if let Some(idx) = wb.index_of(&alias) {
            return Ok(idx);
        }
        ctx.log(format!("sheet '{subject}' is hidden; rows go to '{alias}'"));
        alias
    } else {
        subject.to_string()
    };

    let idx = wb
        .add_sheet_named(&name)
        .ok_or_else(|| Error::Validation(format!("cannot create sheet '{name}'")))?;
    if let Some(sheet) = wb.sheet_mut(idx) {
        template.apply(sheet);
    }
    ctx.log(format!("created sheet '{name}'"));
    outcome.created_sheets.push(name);
    Ok(idx)
}

/// Append the ledger rows of periods `latest < p <= make` to subject sheets.
pub fn run_copy_data(wb: &mut Workbook, make: &str, latest: &str, ctx: &RunContext) -> Result<CopyOutcome> {
    let make_num = period_number(make, MAKE_LABEL)?;
    let latest_num = period_number(latest, LATEST_LABEL)?;
    ctx.log(format!("copying ledger rows after {latest} up to {make}"));

    let subjects = subject_map(wb, ctx)?;
    let schema = LedgerSchema::STANDARD;
    let ledger = &wb.sheets()[find_by_fuzzy_substring(wb, LEDGER_TOKEN)?];
    schema.bind(ledger)?;
    let template = SheetTemplate::from_ledger(ledger);
    let new_rows = collect_new_rows(ledger, &schema, &subjects, latest_num, make_num);
    ctx.log(format!("{} ledger rows to copy", new_rows.len()));

    let mut outcome = CopyOutcome::default();
    let mut touched = BTreeSet::new();
    for row in new_rows {
        ctx.check(TASK)?;
        let idx = destination_sheet(wb, &row.subject, &template, &mut outcome, ctx)?;
        let Some(sheet) = wb.sheet_mut(idx) else { continue };

        let at = last_filled_row(sheet, &schema).unwrap_or(1) + 1;
        sheet.insert_rows(at, 1);
        for (col, cell) in row.cells {
            sheet.set_cell(at, col, cell);
        }
        mark_sheet_colors(sheet, &DetailSchema::STANDARD);

        ctx.log(format!("'{}': ledger row {} inserted at row {at}", sheet.name, row.source_row));
        touched.insert(sheet.name.clone());
        outcome.rows_copied += 1;
    }

    outcome.touched_sheets = touched.into_iter().collect();
    outcome.manifest_sheet = write_manifest(wb, &outcome.touched_sheets, make, latest, ctx)?;
    Ok(outcome)
}

fn remark_key(value: &CellValue) -> Option<String> {
    match value.resolved() {
        CellValue::Text(s) if !s.is_empty() => Some(format!("t:{s}")),
        CellValue::Number(n) | CellValue::Date(n) if *n != 0.0 => Some(format!("n:{n}")),
        CellValue::Bool(true) => Some("n:1".to_string()),
        _ => None,
    }
}

fn amount_key(value: Option<f64>) -> Option<u64> {
    value.filter(|n| *n != 0.0 && !n.is_nan()).map(f64::to_bits)
}

/// Highlight repeated remarks, and amounts in one column that reappear in
/// the other (likely offsetting entries).
pub fn mark_sheet_colors(sheet: &mut Sheet, schema: &DetailSchema) {
    let mut remarks: HashMap<String, Vec<usize>> = HashMap::new();
    let mut a_amounts = HashSet::new();
    let mut b_amounts = HashSet::new();
    let mut amounts = Vec::new();

    for r in 2..=sheet.max_row() {
        if let Some(key) = remark_key(sheet.value(r, schema.remark)) {
            remarks.entry(key).or_default().push(r);
        }
        let a = amount_key(sheet.value(r, schema.amount_a).as_number());
        let b = amount_key(sheet.value(r, schema.amount_b).as_number());
        a_amounts.extend(a);
        b_amounts.extend(b);
        amounts.push((r, a, b));
    }

    let duplicate = Fill::solid(DUPLICATE_REMARK_FILL);
    for rows in remarks.values().filter(|rows| rows.len() >= 2) {
        for &r in rows {
            sheet.set_fill(r, schema.remark, duplicate);
        }
    }

    let offsetting = Fill::solid(OFFSETTING_AMOUNT_FILL);
    for (r, a, b) in amounts {
        let hit = a.is_some_and(|k| b_amounts.contains(&k)) || b.is_some_and(|k| a_amounts.contains(&k));
        if hit {
            sheet.set_fill(r, schema.amount_a, offsetting);
            sheet.set_fill(r, schema.amount_b, offsetting);
        }
    }
}

/// Replace the manifest sheet with one row per touched sheet.
fn write_manifest(
    wb: &mut Workbook,
    touched: &[String],
    make: &str,
    latest: &str,
    ctx: &RunContext,
) -> Result<Option<String>> {
    if touched.is_empty() {
        ctx.log("no subject sheet was updated; manifest not written");
        return Ok(None);
    }
    let name = manifest_sheet_name(make);
    if let Some(idx) = wb.index_of(&name) {
        wb.delete_sheet(idx);
    }
    let idx = wb
        .add_sheet_named(&name)
        .ok_or_else(|| Error::Validation(format!("cannot create manifest sheet '{name}'")))?;
    if let Some(sheet) = wb.sheet_mut(idx) {
        for (i, header) in MANIFEST_HEADERS.iter().enumerate() {
            sheet.set_value(1, i + 1, *header);
        }
        for (i, sheet_name) in touched.iter().enumerate() {
            let r = i + 2;
            sheet.set_value(r, 1, sheet_name.as_str());
            sheet.set_value(r, 2, make);
            sheet.set_value(r, 3, latest);
        }
        sheet.visibility = Visibility::Hidden;
    }
    ctx.log(format!("manifest '{name}' lists {} sheets", touched.len()));
    Ok(Some(name))
}

// ---------------------------------------------------------------------------
// File drivers
// ---------------------------------------------------------------------------

/// Check, copy and save one workbook.
pub fn update_file(
    path: &Path,
    make: &str,
    latest: &str,
    options: UpdateOptions,
    ctx: &RunContext,
) -> Result<UpdateReport> {
    period::check_update_order(latest, make, LATEST_LABEL, MAKE_LABEL)?;
    let saved_to: PathBuf = match options.save_mode {
        SaveMode::Suffixed => save::suffixed_path(path, UPDATED_SUFFIX),
        SaveMode::InPlace => {
            save::ensure_in_place_target(path)?;
            path.to_path_buf()
        }
    };

    ctx.log(format!("loading {}", path.display()));
    let mut wb = xlsx::load(path)?;

    let verdict = run_check(&wb, latest, ctx)?;
    if !verdict.is_success() {
        return Err(Error::Reconciliation(Box::new(verdict)));
    }
    ctx.check(TASK)?;

    let outcome = run_copy_data(&mut wb, make, latest, ctx)?;
    ctx.check(TASK)?;

    save::save_to(&wb, &saved_to)?;
    ctx.log(format!("saved {}", saved_to.display()));
    Ok(UpdateReport { verdict, outcome, saved_to })
}

/// Run the balance check on a workbook file without changing it.
pub fn check_file(path: &Path, target: &str, ctx: &RunContext) -> Result<Verdict> {
    period::parse(target, LATEST_LABEL)?;
    ctx.log(format!("loading {}", path.display()));
    let wb = xlsx::load(path)?;
    run_check(&wb, target, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_subject_text_strips_deduction_marker() {
        assert_eq!(clean_subject_text(" 減：累計折舊 "), "累計折舊");
        assert_eq!(clean_subject_text("减:備抵呆帳"), "備抵呆帳");
        assert_eq!(clean_subject_text("減﹕ 累計 折舊"), "累計折舊");
        assert_eq!(clean_subject_text("減項"), "減項");
        assert_eq!(clean_subject_text("1101"), "1101");
    }

    #[test]
    fn latest_rows_keep_highest_row_in_first_seen_order() {
        let row = |r: usize, subject: &str, amount: f64| LedgerRow {
            row: r,
            date: "113-01-01".into(),
            class_code: "1101".into(),
            subject: subject.into(),
            amount,
        };
        let latest = latest_rows(vec![row(2, "現金", 1.0), row(3, "存貨", 2.0), row(4, "現金", 3.0)]);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].subject, "現金");
        assert_eq!(latest[0].amount, 3.0);
        assert_eq!(latest[1].subject, "存貨");
    }

    #[test]
    fn duplicate_remarks_and_offsetting_amounts_are_highlighted() {
        let schema = DetailSchema::STANDARD;
        let mut sheet = Sheet::new("1101");
        sheet.set_value(2, 5, "INV-1");
        sheet.set_value(2, 6, 100.0);
        sheet.set_value(3, 5, "INV-1");
        sheet.set_value(3, 7, 100.0);
        sheet.set_value(4, 5, "INV-2");
        sheet.set_value(4, 6, 55.0);
        sheet.set_value(5, 5, 0.0);
        sheet.set_value(6, 5, 0.0);

        mark_sheet_colors(&mut sheet, &schema);

        let fill = |r, c| sheet.style(r, c).and_then(|s| s.fill).map(|f| f.color);
        assert_eq!(fill(2, 5), Some(DUPLICATE_REMARK_FILL));
        assert_eq!(fill(3, 5), Some(DUPLICATE_REMARK_FILL));
        assert_eq!(fill(4, 5), None);
        assert_eq!(fill(5, 5), None);
        assert_eq!(fill(2, 6), Some(OFFSETTING_AMOUNT_FILL));
        assert_eq!(fill(2, 7), Some(OFFSETTING_AMOUNT_FILL));
        assert_eq!(fill(3, 6), Some(OFFSETTING_AMOUNT_FILL));
        assert_eq!(fill(3, 7), Some(OFFSETTING_AMOUNT_FILL));
        assert_eq!(fill(4, 6), None);
    }

    #[test]
    fn manifest_name() {
        assert_eq!(manifest_sheet_name("11401"), "更新清單_11401");
    }
}
