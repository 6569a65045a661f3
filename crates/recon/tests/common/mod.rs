#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ledgergrid_engine::cell::{CellStyle, Font};
use ledgergrid_engine::{CellValue, Sheet, Visibility, Workbook};
use ledgergrid_recon::{CancelToken, LogSink, RunContext};

pub const HEADER: [&str; 9] = ["日期", "傳票", "科目代號", "科目名稱", "摘要", "借方", "貸方", "方向", "餘額"];

/// One ledger-shaped row: A date, C class code, D subject, E remark,
/// F debit, G credit, I balance.
pub struct Entry<'a> {
    pub date: &'a str,
    pub code: &'a str,
    pub subject: &'a str,
    pub remark: &'a str,
    pub debit: f64,
    pub credit: f64,
    pub balance: f64,
}

pub fn entry<'a>(date: &'a str, code: &'a str, subject: &'a str, balance: f64) -> Entry<'a> {
    Entry { date, code, subject, remark: "", debit: 0.0, credit: 0.0, balance }
}

impl<'a> Entry<'a> {
    pub fn remark(mut self, remark: &'a str) -> Self {
        self.remark = remark;
        self
    }

    pub fn amounts(mut self, debit: f64, credit: f64) -> Self {
        self.debit = debit;
        self.credit = credit;
        self
    }
}

pub fn header_style() -> CellStyle {
    CellStyle { font: Some(Font { bold: true, ..Font::default() }), ..CellStyle::default() }
}

pub fn write_header(sheet: &mut Sheet) {
    for (i, title) in HEADER.iter().enumerate() {
        sheet.set_value(1, i + 1, *title);
        sheet.set_style(1, i + 1, Some(header_style()));
    }
}

pub fn write_entry(sheet: &mut Sheet, row: usize, e: &Entry) {
    sheet.set_value(row, 1, e.date);
    sheet.set_value(row, 2, format!("V{row:03}"));
    sheet.set_value(row, 3, e.code);
    sheet.set_value(row, 4, e.subject);
    if !e.remark.is_empty() {
        sheet.set_value(row, 5, e.remark);
    }
    sheet.set_value(row, 6, e.debit);
    sheet.set_value(row, 7, e.credit);
    sheet.set_value(row, 8, "借");
    sheet.set_value(row, 9, e.balance);
}

/// Append a ledger-shaped sheet holding `entries` from row 2.
pub fn add_ledger_sheet(wb: &mut Workbook, name: &str, entries: &[Entry]) -> usize {
    let idx = wb.add_sheet_named(name).unwrap();
    let sheet = wb.sheet_mut(idx).unwrap();
    write_header(sheet);
    sheet.set_col_width(1, 12.0);
    sheet.set_col_width(4, 20.0);
    for (i, e) in entries.iter().enumerate() {
        write_entry(sheet, i + 2, e);
    }
    idx
}

/// `資產負債表` with (code, name) pairs laid out two per row.
pub fn add_balance_sheet(wb: &mut Workbook, subjects: &[(&str, &str)]) {
    let idx = wb.add_sheet_named("資產負債表").unwrap();
    let sheet = wb.sheet_mut(idx).unwrap();
    for (c, title) in ["代號", "資產", "金額", "代號", "負債及權益", "金額"].iter().enumerate() {
        sheet.set_value(1, c + 1, *title);
    }
    for (i, (code, name)) in subjects.iter().enumerate() {
        let row = i / 2 + 2;
        let col = if i % 2 == 0 { 1 } else { 4 };
        sheet.set_value(row, col, *code);
        sheet.set_value(row, col + 1, *name);
    }
}

pub fn hide(wb: &mut Workbook, name: &str) {
    wb.sheet_by_name_mut(name).unwrap().visibility = Visibility::Hidden;
}

pub fn text(sheet: &Sheet, row: usize, col: usize) -> String {
    sheet.value(row, col).trimmed()
}

pub fn number(sheet: &Sheet, row: usize, col: usize) -> Option<f64> {
    match sheet.value(row, col) {
        CellValue::Empty => None,
        v => v.as_number(),
    }
}

/// Context whose progress lines are captured for assertions.
pub fn capturing_context() -> (RunContext, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let ctx = RunContext::new(
        LogSink::new(move |line| sink.lock().unwrap().push(line.to_string())),
        CancelToken::disabled(),
    );
    (ctx, lines)
}

pub fn cancelled_context() -> RunContext {
    RunContext::new(LogSink::default(), CancelToken::from(true))
}
