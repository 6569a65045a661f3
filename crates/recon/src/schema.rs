//! Named column layouts of the sheets the services read.
//!
//! Columns are 1-based. A schema is bound once per sheet; binding checks the
//! sheet is wide enough so row loops can address cells without further checks.

use ledgergrid_engine::Sheet;

use crate::error::{Error, Result};

pub trait ColumnSchema {
    /// Layout name used in error messages
    const NAME: &'static str;

    fn columns(&self) -> Vec<usize>;

    fn widest(&self) -> usize {
        self.columns().into_iter().max().unwrap_or(0)
    }

    /// Fail when a non-empty sheet does not reach the widest column.
    fn bind(&self, sheet: &Sheet) -> Result<()> {
        let widest = self.widest();
        if !sheet.is_empty() && sheet.max_col() < widest {
            return Err(Error::Validation(format!(
                "sheet '{}' does not match the {} layout: it needs data up to column {}, found {}",
                sheet.name,
                Self::NAME,
                column_letter(widest),
                column_letter(sheet.max_col()),
            )));
        }
        Ok(())
    }
}

/// The ledger (`分類帳`) and the subject sheets copied from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSchema {
    pub date: usize,
    pub class_code: usize,
    pub subject: usize,
    pub amount: usize,
    /// Cells A..=copy_width are copied when a ledger row is propagated
    pub copy_width: usize,
}

impl LedgerSchema {
    pub const STANDARD: LedgerSchema = LedgerSchema {
        date: 1,
        class_code: 3,
        subject: 4,
        amount: 9,
        copy_width: 9,
    };
}

impl ColumnSchema for LedgerSchema {
    const NAME: &'static str = "ledger";

    fn columns(&self) -> Vec<usize> {
        vec![self.date, self.class_code, self.subject, self.amount]
    }
}

/// Detail columns of a subject sheet, read by the deletion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailSchema {
    pub remark: usize,
    pub amount_a: usize,
    pub amount_b: usize,
}

impl DetailSchema {
    pub const STANDARD: DetailSchema = DetailSchema { remark: 5, amount_a: 6, amount_b: 7 };
}

impl ColumnSchema for DetailSchema {
    const NAME: &'static str = "subject detail";

    fn columns(&self) -> Vec<usize> {
        vec![self.remark, self.amount_a, self.amount_b]
    }
}

/// `資產負債表`: two side-by-side (code, name) column pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSchema {
    pub pairs: [(usize, usize); 2],
}

impl BalanceSchema {
    pub const STANDARD: BalanceSchema = BalanceSchema { pairs: [(1, 2), (4, 5)] };
}

impl ColumnSchema for BalanceSchema {
    const NAME: &'static str = "balance sheet";

    fn columns(&self) -> Vec<usize> {
        self.pairs.iter().flat_map(|&(code, name)| [code, name]).collect()
    }
}

/// Excel column letters for a 1-based column (`1 → A`, `27 → AA`).
pub fn column_letter(col: usize) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
