use ledgergrid_engine::sheet::INVALID_SHEET_NAME_CHARS;
use ledgergrid_engine::Sheet;

use crate::period;
use crate::schema::LedgerSchema;

/// Date cell of the opening-balance row; always in scope.
pub const CARRY_FORWARD: &str = "上期結轉";

/// Class codes that never get a subject sheet.
pub const EXCLUDED_CODES: [&str; 5] = ["1191", "1192", "1193", "1197", "1198"];

pub fn is_excluded(code: &str) -> bool {
    EXCLUDED_CODES.contains(&code)
}

/// An in-scope ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub row: usize,
    pub date: String,
    pub class_code: String,
    pub subject: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowClass {
    InScope(LedgerRow),
    /// In scope, but the subject cannot be used as a sheet name.
    InvalidName { row: usize, subject: String },
    OutOfScope,
}

/// Classify one ledger row against the target period.
///
/// A row is in scope when its date token falls in or before `target` (or is
/// the carry-forward sentinel), its amount is numeric, its class code starts
/// with `1` or `2`, and it names a subject.
pub fn classify_row(sheet: &Sheet, row: usize, schema: &LedgerSchema, target: u32) -> RowClass {
    let date = sheet.value(row, schema.date).trimmed();
    let in_period = match period::period_of_token(&date) {
        Some(p) => p <= target,
        None => date == CARRY_FORWARD,
    };
    if !in_period {
        return RowClass::OutOfScope;
    }

    let Some(amount) = sheet.value(row, schema.amount).as_number() else {
        return RowClass::OutOfScope;
    };
    let class_code = sheet.value(row, schema.class_code).trimmed();
    if !class_code.starts_with(['1', '2']) {
        return RowClass::OutOfScope;
    }
    let subject = sheet.value(row, schema.subject).trimmed();
    if subject.is_empty() {
        return RowClass::OutOfScope;
    }

    if subject.contains(INVALID_SHEET_NAME_CHARS) {
        return RowClass::InvalidName { row, subject };
    }
    RowClass::InScope(LedgerRow { row, date, class_code, subject, amount })
}

/// Sort key for class codes: the leading digits as an integer, unparsable
/// codes last.
pub fn class_code_order(code: &str) -> u64 {
    let digits: String = code.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(u64::MAX)
}
