use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const STATEMENT: &str = "\
HDFC BANK LTD
\"Account Number : 0012345678\"
\"IFSC Code : HDFC0001234\"
Date,Narration,Value Dt,Withdrawal Amt.,Deposit Amt.,Closing Balance
01/04/2024,UPI-SWIGGY-1111,01/04/2024,250.00,,9750.00
03/04/2024,NEFT-ACME PAYROLL-APR24,03/04/2024,,50000.00,59750.00
05/04/2024,UPI-ZOMATO-2222,05/04/2024,420.50,,59329.50
08/04/2024,ATM-WDL-3333,08/04/2024,2000.00,,57329.50
12/04/2024,UPI-REFUND-4444,12/04/2024,,150.00,57479.50
15/04/2024,POS-AMAZON-5555,15/04/2024,1299.00,,56180.50
End of statement
";

fn hisaab(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hisaab").unwrap();
    cmd.env("HOME", home).env("NO_COLOR", "1").env_remove("HISAAB_LOG");
    cmd
}

fn setup() -> (TempDir, PathBuf) {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    hisaab(home.path())
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized hisaab"));
    let statement = home.path().join("apr.csv");
    std::fs::write(&statement, STATEMENT).unwrap();
    (home, statement)
}

#[test]
fn test_init_writes_settings_and_database() {
    let (home, _) = setup();
    assert!(home.path().join(".config/hisaab/settings.json").exists());
    assert!(home.path().join("data/hisaab.db").exists());
}

#[test]
fn test_commands_require_init() {
    let home = tempfile::tempdir().unwrap();
    hisaab(home.path())
        .args(["transactions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hisaab init"));
}

#[test]
fn test_import_then_reimport_is_duplicate() {
    let (home, statement) = setup();
    hisaab(home.path())
        .arg("import")
        .arg(&statement)
        .assert()
        .success()
        .stdout(predicate::str::contains("0012345678"))
        .stdout(predicate::str::contains("6 imported"));

    hisaab(home.path())
        .arg("import")
        .arg(&statement)
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));

    hisaab(home.path())
        .args(["transactions", "--account", "0012345678"])
        .assert()
        .success()
        .stdout(predicate::str::contains("POS-AMAZON-5555"))
        .stdout(predicate::str::contains("6 entries"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (home, statement) = setup();
    hisaab(home.path())
        .args(["import", "--dry-run"])
        .arg(&statement)
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    hisaab(home.path())
        .arg("transactions")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 entries"));
}

#[test]
fn test_inspect_reports_structure() {
    let (home, statement) = setup();
    hisaab(home.path())
        .arg("inspect")
        .arg(&statement)
        .assert()
        .success()
        .stdout(predicate::str::contains("rows 5-10"))
        .stdout(predicate::str::contains("Withdrawal Amt."))
        .stdout(predicate::str::contains("HDFC0001234"))
        .stdout(predicate::str::contains("oldest first"));
}

#[test]
fn test_unstructured_file_fails() {
    let (home, _) = setup();
    let notes = home.path().join("notes.csv");
    std::fs::write(&notes, "just,some\nwords,here\n").unwrap();
    hisaab(home.path())
        .arg("import")
        .arg(&notes)
        .args(["--account", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not infer statement structure"));
}

#[test]
fn test_patterns_add_and_list() {
    let (home, _) = setup();
    hisaab(home.path())
        .args(["patterns", "add", "debit", "money out", "--kind", "synonym"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added synonym pattern"));

    hisaab(home.path())
        .args(["patterns", "add", "PAN", "[{\"LOWER\": \"pan\"}]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));

    hisaab(home.path())
        .args(["patterns", "add", "MICR Code", "not json"])
        .assert()
        .failure();

    hisaab(home.path())
        .args(["patterns", "list", "--field", "debit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("money out"))
        .stdout(predicate::str::contains("withdrawal"));
}

#[test]
fn test_transactions_rejects_bad_date() {
    let (home, _) = setup();
    hisaab(home.path())
        .args(["transactions", "--from", "April"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}
