use std::path::PathBuf;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Reconciliation verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// Subjects behind a non-success verdict, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Details {
    /// Subjects whose sheet is missing or whose last balance differs.
    pub inconsistent: Vec<String>,
    /// Subjects with a zero ledger balance that still have a sheet.
    pub zero_items_but_kept: Vec<String>,
    /// `row N: name` entries whose subject cannot be a sheet name.
    pub invalid_items: Vec<String>,
}

impl Details {
    pub fn is_empty(&self) -> bool {
        self.inconsistent.is_empty() && self.zero_items_but_kept.is_empty() && self.invalid_items.is_empty()
    }
}

/// Outcome of comparing ledger balances with subject sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: Status,
    pub message: String,
    pub details: Details,
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// What a propagation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CopyOutcome {
    /// Ledger rows inserted into subject sheets.
    pub rows_copied: usize,
    /// Sheets that received rows, sorted by name.
    pub touched_sheets: Vec<String>,
    /// Sheets created during the pass, in creation order.
    pub created_sheets: Vec<String>,
    /// Manifest written for the deletion pass, if any sheet was touched.
    pub manifest_sheet: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub verdict: Verdict,
    pub outcome: CopyOutcome,
    pub saved_to: PathBuf,
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteSummary {
    /// Subject rows listed in the manifest.
    pub manifest_rows: usize,
    pub sheets_processed: usize,
    pub rows_deleted: usize,
    /// Manifest subjects with no sheet of that exact name.
    pub skipped_sheets: Vec<String>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Paste
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PasteSummary {
    pub tasks_run: usize,
    /// Modules whose source file disappeared between validation and paste.
    pub tasks_skipped: Vec<String>,
    pub rows_written: usize,
    pub master: PathBuf,
    pub message: String,
}
