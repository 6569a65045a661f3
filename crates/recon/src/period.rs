//! ROC year-month period codes.
//!
//! A period code is five ASCII digits: a three-digit ROC year starting with
//! `1` and a two-digit month, e.g. `11312` for December of ROC 113 (2024).

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::{Error, Result};

/// Offset between ROC and Gregorian years
pub const ROC_YEAR_OFFSET: i32 = 1911;

pub const MAKE_LABEL: &str = "make period";
pub const LATEST_LABEL: &str = "latest period";

/// Parse a period code into the first day of its month.
pub fn parse(code: &str, label: &str) -> Result<NaiveDate> {
    if code.is_empty() {
        return Err(Error::Format(format!("{label} is required")));
    }
    if code.len() != 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Format(format!(
            "{label} must be a 5-digit ROC year and month such as 11312, got '{code}'"
        )));
    }
    if !code.starts_with('1') {
        return Err(Error::Format(format!("{label} year must start with 1, got '{code}'")));
    }
    let roc_year: i32 = code[..3].parse().map_err(|_| bad_code(code, label))?;
    let month: u32 = code[3..].parse().map_err(|_| bad_code(code, label))?;
    if !(1..=12).contains(&month) {
        return Err(Error::Format(format!(
            "{label} month must be between 01 and 12, got '{code}'"
        )));
    }
    NaiveDate::from_ymd_opt(roc_year + ROC_YEAR_OFFSET, month, 1).ok_or_else(|| bad_code(code, label))
}

fn bad_code(code: &str, label: &str) -> Error {
    Error::Format(format!("{label} is not a valid period: '{code}'"))
}

/// ROC year and month of a parsed period.
pub fn roc_parts(date: NaiveDate) -> (i32, u32) {
    (date.year() - ROC_YEAR_OFFSET, date.month())
}

/// Strict ordering check used before propagating balances.
///
/// `make` may not precede `latest`, and the two must fall in the same ROC
/// year, or in consecutive years with `latest` in December.
pub fn check_update_order(latest: &str, make: &str, latest_label: &str, make_label: &str) -> Result<()> {
    let latest_date = parse(latest, latest_label)?;
    let make_date = parse(make, make_label)?;

    if make_date < latest_date {
        return Err(Error::Validation(format!(
            "{make_label} ({make}) must not be earlier than {latest_label} ({latest})"
        )));
    }
    match make_date.year() - latest_date.year() {
        0 => Ok(()),
        1 if latest_date.month() == 12 => Ok(()),
        1 => Err(Error::Validation(format!(
            "{make_label} ({make}) is in the next year, so {latest_label} ({latest}) must be December"
        ))),
        _ => Err(Error::Validation(format!(
            "{make_label} ({make}) and {latest_label} ({latest}) are more than one year apart"
        ))),
    }
}

/// Boolean form of [`check_update_order`]; logs the violated rule.
pub fn validate(latest: &str, make: &str) -> bool {
    match check_update_order(latest, make, LATEST_LABEL, MAKE_LABEL) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{}", e);
            false
        }
    }
}

/// Loose ordering: `make` is the same month as `latest` or later.
pub fn is_not_before(latest: &str, make: &str) -> Result<bool> {
    let latest_date = parse(latest, LATEST_LABEL)?;
    let make_date = parse(make, MAKE_LABEL)?;
    Ok(make_date >= latest_date)
}

/// Name of the monthly input folder, e.g. `"12月"` for `11312`.
pub fn month_folder(period: &str) -> String {
    let chars: Vec<char> = period.chars().collect();
    if chars.len() < 2 {
        return String::new();
    }
    let mut folder: String = chars[chars.len() - 2..].iter().collect();
    folder.push('月');
    folder
}

fn date_token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(1[0-9]{2})[-/.]?(0[1-9]|1[0-2])").ok()).as_ref()
}

/// Period encoded by the start of a ledger date token.
///
/// Accepts `113-12-05`, `113/12`, `11312...` and similar; the token is trimmed
/// first.
pub fn period_of_token(token: &str) -> Option<u32> {
    let caps = date_token_regex()?.captures(token.trim())?;
    format!("{}{}", &caps[1], &caps[2]).parse().ok()
}
