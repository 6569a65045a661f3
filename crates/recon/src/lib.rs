//! `ledgergrid-recon` — Ledger reconciliation services.
//!
//! Pure service crate: each service takes an opened [`ledgergrid_engine::Workbook`]
//! (or a path, through the `*_file` drivers) plus a [`RunContext`], and returns
//! a typed summary or [`Error`]. No CLI dependencies.
//!
//! - [`update`]: check subject sheets against the ledger, then append new rows
//! - [`delete`]: remove settled detail rows from the sheets an update touched
//! - [`paste`]: copy monthly source reports into the master workbook

pub mod classify;
pub mod context;
pub mod delete;
pub mod error;
pub mod locator;
pub mod model;
pub mod paste;
pub mod period;
pub mod save;
pub mod schema;
pub mod update;

pub use context::{CancelToken, LogSink, RunContext};
pub use delete::{delete_file, run_delete};
pub use error::{Error, Result};
pub use model::{CopyOutcome, DeleteSummary, Details, PasteSummary, Status, UpdateReport, Verdict};
pub use paste::{paste_file, paste_reports, PasteRequest};
pub use update::{check_file, run_check, run_copy_data, update_file, SaveMode, UpdateOptions};
