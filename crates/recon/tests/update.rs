mod common;

use ledgergrid_engine::{Visibility, Workbook};
use ledgergrid_io::xlsx;
use ledgergrid_recon::update::{
    manifest_sheet_name, DUPLICATE_REMARK_FILL, MANIFEST_HEADERS, OFFSETTING_AMOUNT_FILL,
};
use ledgergrid_recon::{
    check_file, run_check, run_copy_data, update_file, Error, RunContext, SaveMode, Status, UpdateOptions,
};

use common::*;

/// Ledger through 114-02 with two subjects whose sheets are current as of 11312.
fn book() -> Workbook {
    let mut wb = Workbook::new();
    add_balance_sheet(&mut wb, &[("1101", "現金"), ("2101", "應付帳款")]);
    add_ledger_sheet(
        &mut wb,
        "分類帳",
        &[
            entry("上期結轉", "1101", "現金", 1000.0),
            entry("113-12-05", "1101", "現金", 1500.0).remark("INV-1").amounts(500.0, 0.0),
            entry("113-12-20", "2101", "應付帳款", 300.0).remark("PO-9").amounts(0.0, 300.0),
            entry("114-01-03", "1101", "現金", 1000.0).remark("INV-2").amounts(0.0, 500.0),
            entry("114-01-10", "2101", "應付帳款", 0.0).remark("PO-9").amounts(300.0, 0.0),
            entry("114-02-01", "1101", "現金", 900.0).remark("late").amounts(0.0, 100.0),
        ],
    );
    add_ledger_sheet(
        &mut wb,
        "現金",
        &[
            entry("上期結轉", "1101", "現金", 1000.0),
            entry("113-12-05", "1101", "現金", 1500.0).remark("INV-1").amounts(500.0, 0.0),
        ],
    );
    add_ledger_sheet(
        &mut wb,
        "應付帳款",
        &[entry("113-12-20", "2101", "應付帳款", 300.0).remark("PO-9").amounts(0.0, 300.0)],
    );
    wb
}

fn append_ledger(wb: &mut Workbook, e: Entry) {
    let ledger = wb.sheet_by_name_mut("分類帳").unwrap();
    let row = ledger.max_row() + 1;
    write_entry(ledger, row, &e);
}

fn check(wb: &Workbook) -> ledgergrid_recon::Verdict {
    run_check(wb, "11312", &RunContext::default()).unwrap()
}

// -------------------------------------------------------------------------
// Balance check
// -------------------------------------------------------------------------

#[test]
fn consistent_workbook_passes_check() {
    let verdict = check(&book());
    assert_eq!(verdict.status, Status::Success);
    assert!(verdict.details.is_empty());
    assert!(verdict.message.contains("11312"));
}

#[test]
fn balances_within_tolerance_are_consistent() {
    let mut wb = book();
    wb.sheet_by_name_mut("現金").unwrap().set_value(3, 9, 1500.0005);
    assert!(check(&wb).is_success());

    wb.sheet_by_name_mut("現金").unwrap().set_value(3, 9, 1500.01);
    let verdict = check(&wb);
    assert_eq!(verdict.status, Status::Error);
    assert_eq!(verdict.details.inconsistent, vec!["現金"]);
    assert!(verdict.message.contains("現金"));
}

#[test]
fn last_ledger_row_of_a_subject_decides() {
    let mut wb = book();
    append_ledger(&mut wb, entry("113-12-31", "1101", "現金", 1600.0));
    assert_eq!(check(&wb).details.inconsistent, vec!["現金"]);
}

#[test]
fn missing_subject_sheet_is_inconsistent() {
    let mut wb = book();
    let idx = wb.index_of("應付帳款").unwrap();
    wb.delete_sheet(idx);
    let verdict = check(&wb);
    assert_eq!(verdict.details.inconsistent, vec!["應付帳款"]);
}

#[test]
fn sheet_names_match_ignoring_whitespace() {
    let mut wb = book();
    wb.sheet_by_name_mut("現金").unwrap().name = "現\u{3000}金 ".to_string();
    assert!(check(&wb).is_success());
}

#[test]
fn hidden_subject_sheet_does_not_count() {
    let mut wb = book();
    hide(&mut wb, "現金");
    assert_eq!(check(&wb).details.inconsistent, vec!["現金"]);
}

#[test]
fn zero_balance_without_sheet_is_dropped() {
    let mut wb = book();
    append_ledger(&mut wb, entry("113-12-25", "1102", "零用金", 0.0));
    assert!(check(&wb).is_success());
}

#[test]
fn zero_balance_with_sheet_is_kept_and_reported() {
    let mut wb = book();
    append_ledger(&mut wb, entry("113-12-25", "1102", "零用金", 0.0));
    add_ledger_sheet(&mut wb, "零用金", &[entry("113-11-01", "1102", "零用金", 5.0)]);

    let verdict = check(&wb);
    assert_eq!(verdict.status, Status::Error);
    assert_eq!(verdict.details.zero_items_but_kept, vec!["零用金"]);
    // the balance differs, but zero-kept subjects are not listed twice
    assert!(verdict.details.inconsistent.is_empty());
    assert!(verdict.message.contains("零用金"));
}

#[test]
fn excluded_class_codes_are_skipped() {
    let mut wb = book();
    append_ledger(&mut wb, entry("113-12-01", "1191", "暫付款", 50.0));
    assert!(check(&wb).is_success());
}

#[test]
fn illegal_subject_name_short_circuits() {
    let mut wb = book();
    append_ledger(&mut wb, entry("113-12-02", "1103", "銀行:台銀", 10.0));
    let idx = wb.index_of("應付帳款").unwrap();
    wb.delete_sheet(idx);

    let verdict = check(&wb);
    assert_eq!(verdict.status, Status::Error);
    assert_eq!(verdict.details.invalid_items, vec!["row 8: 銀行:台銀"]);
    assert!(verdict.details.inconsistent.is_empty());
    assert!(verdict.details.zero_items_but_kept.is_empty());
    assert!(verdict.message.contains("銀行:台銀"));
    assert!(!verdict.message.contains("應付帳款"));
}

#[test]
fn no_rows_up_to_target_is_an_error_verdict() {
    let mut wb = Workbook::new();
    add_ledger_sheet(&mut wb, "分類帳", &[entry("113-05-01", "1101", "現金", 10.0)]);
    let verdict = run_check(&wb, "11304", &RunContext::default()).unwrap();
    assert_eq!(verdict.status, Status::Error);
    assert!(verdict.message.contains("no qualifying data"));
    assert!(verdict.details.is_empty());
}

#[test]
fn ledger_is_found_by_substring() {
    let mut wb = book();
    wb.sheet_by_name_mut("分類帳").unwrap().name = "113年度 分類帳".to_string();
    assert!(check(&wb).is_success());

    wb.sheet_by_name_mut("113年度 分類帳").unwrap().name = "總帳".to_string();
    assert!(matches!(run_check(&wb, "11312", &RunContext::default()), Err(Error::NotFound(_))));
}

#[test]
fn malformed_target_is_a_format_error() {
    assert!(matches!(run_check(&book(), "11313", &RunContext::default()), Err(Error::Format(_))));
}

// -------------------------------------------------------------------------
// Propagation
// -------------------------------------------------------------------------

fn copy(wb: &mut Workbook) -> ledgergrid_recon::CopyOutcome {
    run_copy_data(wb, "11401", "11312", &RunContext::default()).unwrap()
}

#[test]
fn new_period_rows_are_appended() {
    let mut wb = book();
    let outcome = copy(&mut wb);

    assert_eq!(outcome.rows_copied, 2);
    let mut expected = vec!["現金".to_string(), "應付帳款".to_string()];
    expected.sort();
    assert_eq!(outcome.touched_sheets, expected);
    assert!(outcome.created_sheets.is_empty());

    let cash = wb.sheet_by_name("現金").unwrap();
    assert_eq!(cash.max_row(), 4);
    assert_eq!(text(cash, 4, 1), "114-01-03");
    assert_eq!(text(cash, 4, 5), "INV-2");
    assert_eq!(number(cash, 4, 9), Some(1000.0));

    let payable = wb.sheet_by_name("應付帳款").unwrap();
    assert_eq!(text(payable, 3, 1), "114-01-10");
    assert_eq!(number(payable, 3, 9), Some(0.0));
}

#[test]
fn rows_are_inserted_above_trailing_summary_rows() {
    let mut wb = book();
    let cash = wb.sheet_by_name_mut("現金").unwrap();
    cash.set_value(4, 4, "合計");
    cash.set_value(4, 9, 1500.0);

    copy(&mut wb);

    let cash = wb.sheet_by_name("現金").unwrap();
    assert_eq!(text(cash, 4, 1), "114-01-03");
    assert_eq!(text(cash, 5, 4), "合計");
}

#[test]
fn touched_sheets_are_highlighted() {
    let mut wb = book();
    copy(&mut wb);

    let payable = wb.sheet_by_name("應付帳款").unwrap();
    let fill = |r, c| payable.style(r, c).and_then(|s| s.fill).map(|f| f.color);
    assert_eq!(fill(2, 5), Some(DUPLICATE_REMARK_FILL));
    assert_eq!(fill(3, 5), Some(DUPLICATE_REMARK_FILL));
    assert_eq!(fill(2, 6), Some(OFFSETTING_AMOUNT_FILL));
    assert_eq!(fill(3, 7), Some(OFFSETTING_AMOUNT_FILL));

    let cash = wb.sheet_by_name("現金").unwrap();
    assert_eq!(cash.style(3, 5).and_then(|s| s.fill), None);
}

#[test]
fn hidden_subject_sheet_gets_an_alias_sheet() {
    let mut wb = book();
    hide(&mut wb, "現金");
    append_ledger(&mut wb, entry("114-01-15", "1101", "現金", 1200.0).remark("INV-3").amounts(200.0, 0.0));

    let outcome = copy(&mut wb);

    assert_eq!(outcome.created_sheets, vec!["@現金"]);
    assert!(outcome.touched_sheets.contains(&"@現金".to_string()));
    let alias = wb.sheet_by_name("@現金").unwrap();
    assert_eq!(alias.visibility, Visibility::Visible);
    assert_eq!(text(alias, 1, 1), "日期");
    assert_eq!(alias.style(1, 1), Some(&header_style()));
    assert_eq!(alias.col_width(4), Some(20.0));
    assert_eq!(text(alias, 2, 5), "INV-2");
    assert_eq!(text(alias, 3, 5), "INV-3");
    // the hidden sheet itself is left alone
    assert_eq!(wb.sheet_by_name("現金").unwrap().max_row(), 3);
}

#[test]
fn new_subject_gets_its_own_sheet() {
    let mut wb = book();
    let balance = wb.sheet_by_name_mut("資產負債表").unwrap();
    balance.set_value(3, 1, "1102");
    balance.set_value(3, 2, "零用金");
    append_ledger(&mut wb, entry("114-01-05", "1102", "零用金", 50.0));

    let outcome = copy(&mut wb);

    assert_eq!(outcome.created_sheets, vec!["零用金"]);
    let petty = wb.sheet_by_name("零用金").unwrap();
    assert_eq!(text(petty, 1, 9), "餘額");
    assert_eq!(number(petty, 2, 9), Some(50.0));
}

#[test]
fn subjects_missing_from_balance_sheet_are_not_copied() {
    let mut wb = book();
    append_ledger(&mut wb, entry("114-01-05", "1301", "存貨", 80.0));
    let outcome = copy(&mut wb);
    assert_eq!(outcome.rows_copied, 2);
    assert!(wb.sheet_by_name("存貨").is_none());
}

#[test]
fn deduction_prefix_is_removed_from_balance_sheet_names() {
    let mut wb = book();
    let balance = wb.sheet_by_name_mut("資產負債表").unwrap();
    balance.set_value(3, 1, "1502");
    balance.set_value(3, 2, "減：累計 折舊");
    append_ledger(&mut wb, entry("114-01-31", "1502", "累計折舊", -30.0));

    let outcome = copy(&mut wb);
    assert_eq!(outcome.created_sheets, vec!["累計折舊"]);
}

#[test]
fn manifest_lists_touched_sheets() {
    let mut wb = book();
    let outcome = copy(&mut wb);

    let name = manifest_sheet_name("11401");
    assert_eq!(outcome.manifest_sheet.as_deref(), Some(name.as_str()));
    let manifest = wb.sheet_by_name(&name).unwrap();
    assert_eq!(manifest.visibility, Visibility::Hidden);
    for (i, header) in MANIFEST_HEADERS.iter().enumerate() {
        assert_eq!(text(manifest, 1, i + 1), *header);
    }
    assert_eq!(manifest.max_row(), 3);
    for (i, sheet) in outcome.touched_sheets.iter().enumerate() {
        assert_eq!(&text(manifest, i + 2, 1), sheet);
        assert_eq!(text(manifest, i + 2, 2), "11401");
        assert_eq!(text(manifest, i + 2, 3), "11312");
    }
}

#[test]
fn rerun_replaces_the_manifest() {
    let mut wb = book();
    let idx = wb.add_sheet_named(&manifest_sheet_name("11401")).unwrap();
    wb.sheet_mut(idx).unwrap().set_value(9, 1, "stale");

    copy(&mut wb);

    let manifest = wb.sheet_by_name(&manifest_sheet_name("11401")).unwrap();
    assert_eq!(manifest.max_row(), 3);
    assert_eq!(wb.sheet_names().iter().filter(|n| n.starts_with("更新清單_")).count(), 1);
}

#[test]
fn nothing_new_means_no_manifest() {
    let mut wb = book();
    let outcome = run_copy_data(&mut wb, "11312", "11312", &RunContext::default()).unwrap();
    assert_eq!(outcome.rows_copied, 0);
    assert_eq!(outcome.manifest_sheet, None);
    assert!(wb.sheet_by_name(&manifest_sheet_name("11312")).is_none());
}

#[test]
fn progress_lines_reach_the_sink() {
    let mut wb = book();
    hide(&mut wb, "現金");
    let (ctx, lines) = capturing_context();
    run_copy_data(&mut wb, "11401", "11312", &ctx).unwrap();
    let lines = lines.lock().unwrap();
    assert!(lines.iter().any(|l| l.contains("created sheet '@現金'")));
    assert!(lines.iter().any(|l| l.contains("manifest")));
}

// -------------------------------------------------------------------------
// File driver
// -------------------------------------------------------------------------

#[test]
fn update_file_writes_an_updated_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("科餘.xlsx");
    xlsx::save(&book(), &path).unwrap();

    let report = update_file(&path, "11401", "11312", UpdateOptions::default(), &RunContext::default()).unwrap();

    assert_eq!(report.saved_to, dir.path().join("科餘_updated.xlsx"));
    assert!(report.verdict.is_success());
    assert_eq!(report.outcome.rows_copied, 2);

    let original = xlsx::load(&path).unwrap();
    assert_eq!(original.sheet_by_name("現金").unwrap().max_row(), 3);

    let updated = xlsx::load(&report.saved_to).unwrap();
    let cash = updated.sheet_by_name("現金").unwrap();
    assert_eq!(text(cash, 4, 1), "114-01-03");
    let manifest = updated.sheet_by_name(&manifest_sheet_name("11401")).unwrap();
    assert_eq!(manifest.visibility, Visibility::Hidden);
}

#[test]
fn update_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("科餘.xlsx");
    xlsx::save(&book(), &path).unwrap();

    let options = UpdateOptions { save_mode: SaveMode::InPlace };
    let report = update_file(&path, "11401", "11312", options, &RunContext::default()).unwrap();

    assert_eq!(report.saved_to, path);
    assert_eq!(xlsx::load(&path).unwrap().sheet_by_name("現金").unwrap().max_row(), 4);
}

#[test]
fn update_file_stops_on_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("科餘.xlsx");
    let mut wb = book();
    wb.sheet_by_name_mut("現金").unwrap().set_value(3, 9, 1499.0);
    xlsx::save(&wb, &path).unwrap();

    let err = update_file(&path, "11401", "11312", UpdateOptions::default(), &RunContext::default()).unwrap_err();

    match err {
        Error::Reconciliation(verdict) => assert_eq!(verdict.details.inconsistent, vec!["現金"]),
        other => panic!("expected a reconciliation error, got {other:?}"),
    }
    assert!(!dir.path().join("科餘_updated.xlsx").exists());
}

#[test]
fn update_file_checks_period_order_first() {
    let err = update_file(
        std::path::Path::new("does-not-exist.xlsx"),
        "11401",
        "11311",
        UpdateOptions::default(),
        &RunContext::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn cancelled_update_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("科餘.xlsx");
    xlsx::save(&book(), &path).unwrap();

    let err = update_file(&path, "11401", "11312", UpdateOptions::default(), &cancelled_context()).unwrap_err();

    assert!(matches!(err, Error::Cancelled(_)));
    assert!(!dir.path().join("科餘_updated.xlsx").exists());
}

#[test]
fn check_file_reads_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("科餘.xlsx");
    xlsx::save(&book(), &path).unwrap();

    let verdict = check_file(&path, "11312", &RunContext::default()).unwrap();
    assert!(verdict.is_success());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
