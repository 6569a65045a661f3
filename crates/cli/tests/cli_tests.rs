// End-to-end tests for the `lgrid` binary.
//
// Each test writes its workbook and settings into a temp dir and points
// --config at it, so the per-user settings file is never read or created.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use ledgergrid_engine::{Sheet, Workbook};
use ledgergrid_io::xlsx;

fn lgrid(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lgrid"));
    cmd.arg("--config").arg(config);
    cmd.env_remove("RUST_LOG");
    cmd.stdin(Stdio::null());
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("lgrid should start")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_row(sheet: &mut Sheet, row: usize, date: &str, code: &str, subject: &str, remark: &str, debit: f64, credit: f64, balance: f64) {
    sheet.set_value(row, 1, date);
    sheet.set_value(row, 3, code);
    sheet.set_value(row, 4, subject);
    if !remark.is_empty() {
        sheet.set_value(row, 5, remark);
    }
    sheet.set_value(row, 6, debit);
    sheet.set_value(row, 7, credit);
    sheet.set_value(row, 9, balance);
}

fn header(sheet: &mut Sheet) {
    for (i, title) in ["日期", "傳票", "科目代號", "科目名稱", "摘要", "借方", "貸方", "方向", "餘額"].iter().enumerate() {
        sheet.set_value(1, i + 1, *title);
    }
}

/// Ledger through 114-01 with sheets current as of 11312.
fn book() -> Workbook {
    let mut wb = Workbook::new();

    let idx = wb.add_sheet_named("資產負債表").unwrap();
    let balance = wb.sheet_mut(idx).unwrap();
    balance.set_value(2, 1, "1101");
    balance.set_value(2, 2, "現金");
    balance.set_value(2, 4, "2101");
    balance.set_value(2, 5, "應付帳款");

    let idx = wb.add_sheet_named("分類帳").unwrap();
    let ledger = wb.sheet_mut(idx).unwrap();
    header(ledger);
    write_row(ledger, 2, "113-12-05", "1101", "現金", "INV-1", 500.0, 0.0, 500.0);
    write_row(ledger, 3, "113-12-20", "2101", "應付帳款", "PO-9", 0.0, 300.0, 300.0);
    write_row(ledger, 4, "114-01-03", "1101", "現金", "INV-2", 0.0, 200.0, 300.0);
    write_row(ledger, 5, "114-01-10", "2101", "應付帳款", "PO-9", 300.0, 0.0, 0.0);

    let idx = wb.add_sheet_named("現金").unwrap();
    let cash = wb.sheet_mut(idx).unwrap();
    header(cash);
    write_row(cash, 2, "113-12-05", "1101", "現金", "INV-1", 500.0, 0.0, 500.0);

    let idx = wb.add_sheet_named("應付帳款").unwrap();
    let payable = wb.sheet_mut(idx).unwrap();
    header(payable);
    write_row(payable, 2, "113-12-20", "2101", "應付帳款", "PO-9", 0.0, 300.0, 300.0);

    wb
}

struct Fixture {
    dir: tempfile::TempDir,
    book: PathBuf,
    config: PathBuf,
}

fn fixture(wb: &Workbook) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let book = dir.path().join("科餘.xlsx");
    xlsx::save(wb, &book).unwrap();
    let config = dir.path().join("settings.toml");
    Fixture { dir, book, config }
}

// ===========================================================================
// check
// ===========================================================================

#[test]
fn check_consistent_book_succeeds() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config).arg("check").arg(&fx.book).args(["--latest", "11312"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    // first run writes the default settings file
    assert!(fx.config.exists());
}

#[test]
fn check_json_is_a_single_verdict() {
    let mut wb = book();
    wb.sheet_by_name_mut("現金").unwrap().set_value(2, 9, 499.0);
    let fx = fixture(&wb);

    let output = run(lgrid(&fx.config).arg("check").arg(&fx.book).args(["--latest", "11312", "--json"]));

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(val["status"], "error");
    assert_eq!(val["details"]["inconsistent"][0], "現金");
}

#[test]
fn check_missing_file_is_usage_error() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config).args(["check", "nope.xlsx", "--latest", "11312"]));
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("file not found"));
}

// ===========================================================================
// update / delete
// ===========================================================================

#[test]
fn update_writes_updated_copy() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config).arg("update").arg(&fx.book).args(["--make", "11401", "--latest", "11312"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let updated = xlsx::load(&fx.dir.path().join("科餘_updated.xlsx")).unwrap();
    assert_eq!(updated.sheet_by_name("現金").unwrap().max_row(), 3);
}

#[test]
fn update_rejects_reversed_periods() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config).arg("update").arg(&fx.book).args(["--make", "11312", "--latest", "11401"]));
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn overwrite_setting_updates_in_place() {
    let fx = fixture(&book());
    std::fs::write(&fx.config, "[files]\noverwrite = true\n").unwrap();

    let output = run(lgrid(&fx.config).arg("update").arg(&fx.book).args(["--make", "11401", "--latest", "11312"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!fx.dir.path().join("科餘_updated.xlsx").exists());
    assert_eq!(xlsx::load(&fx.book).unwrap().sheet_by_name("現金").unwrap().max_row(), 3);
}

#[test]
fn delete_without_manifest_is_not_found() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config).arg("delete").arg(&fx.book).args(["--make", "11401", "--latest", "11312"]));
    assert_eq!(output.status.code(), Some(5));
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_updates_then_deletes_the_updated_copy() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config).arg("run").arg(&fx.book).args(["--make", "11401", "--latest", "11312"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let updated = xlsx::load(&fx.dir.path().join("科餘_updated.xlsx")).unwrap();
    // PO-9 settles once the 114-01 payment lands
    assert_eq!(updated.sheet_by_name("應付帳款").unwrap().max_row(), 1);
    assert_eq!(updated.sheet_by_name("現金").unwrap().max_row(), 3);
}

#[test]
fn run_stops_at_first_failure() {
    let mut wb = book();
    wb.sheet_by_name_mut("現金").unwrap().set_value(2, 9, 499.0);
    let fx = fixture(&wb);

    let output = run(lgrid(&fx.config).arg("run").arg(&fx.book).args(["--make", "11401", "--latest", "11312"]));

    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("1 later task(s) not run"));
    assert!(!fx.dir.path().join("科餘_updated.xlsx").exists());
}

#[test]
fn run_paste_needs_a_vendor() {
    let fx = fixture(&book());
    let output = run(lgrid(&fx.config)
        .arg("run")
        .arg(&fx.book)
        .args(["--make", "11401", "--latest", "11312", "--paste", "--input-root"])
        .arg(fx.dir.path()));
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("paste.vendor_id"));
}

// ===========================================================================
// config
// ===========================================================================

#[test]
fn config_prints_effective_settings() {
    let fx = fixture(&book());
    std::fs::write(&fx.config, "[paste]\nvendor_id = \"A01\"\n").unwrap();

    let output = run(lgrid(&fx.config).arg("config"));

    assert!(output.status.success());
    let val: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(val["paste"]["vendor_id"], "A01");
    assert_eq!(val["modules"]["update"], true);
}
