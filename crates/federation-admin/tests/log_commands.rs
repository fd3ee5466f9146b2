mod common;

use std::fs;

use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::TempDir;

use common::populated_log;

macro_rules! federation_admin {
    () => {
        assert_cmd::cargo::cargo_bin_cmd!("federation-admin")
    };
}

#[test]
fn list_shows_every_transaction() {
    let fixture = populated_log();

    federation_admin!()
        .arg("list")
        .arg("--log")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains(fixture.committed.to_string()))
        .stdout(contains(fixture.pending.to_string()))
        .stdout(contains(fixture.failed.to_string()))
        .stdout(contains("3 transaction(s)"));
}

#[test]
fn list_filters_by_state() {
    let fixture = populated_log();

    federation_admin!()
        .args(["list", "--state", "failed", "--log"])
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains(fixture.failed.to_string()))
        .stdout(contains("error: compensation of step 0 exhausted"))
        .stdout(contains(fixture.committed.to_string()).not())
        .stdout(contains("1 transaction(s)"));
}

#[test]
fn list_reports_empty_state() {
    let fixture = populated_log();

    federation_admin!()
        .args(["list", "--state", "compensating", "--log"])
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("No COMPENSATING transactions."));
}

#[test]
fn list_rejects_unknown_state() {
    let fixture = populated_log();

    federation_admin!()
        .args(["list", "--state", "rolled-back", "--log"])
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(contains("rolled-back"));
}

#[test]
fn incomplete_lists_only_pending_and_compensating() {
    let fixture = populated_log();

    federation_admin!()
        .arg("incomplete")
        .arg("--log")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains(fixture.pending.to_string()))
        .stdout(contains("1/2 steps"))
        .stdout(contains(fixture.failed.to_string()).not())
        .stdout(contains("1 transaction(s)"));
}

#[test]
fn show_prints_record_as_json() {
    let fixture = populated_log();

    federation_admin!()
        .arg("show")
        .arg(fixture.committed.to_string())
        .arg("--log")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("\"state\": \"COMMITTED\""))
        .stdout(contains("\"target_store\""))
        .stdout(contains(fixture.committed.to_string()));
}

#[test]
fn show_unknown_transaction_fails() {
    let fixture = populated_log();

    federation_admin!()
        .args(["show", "00000000-0000-4000-8000-000000000000", "--log"])
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(contains("error: transaction 00000000-0000-4000-8000-000000000000 not found"));
}

#[test]
fn show_rejects_malformed_id_with_cause() {
    let fixture = populated_log();

    federation_admin!()
        .args(["show", "tx-42", "--log"])
        .arg(fixture.path())
        .assert()
        .failure()
        .stderr(contains("error: invalid argument"))
        .stderr(contains("caused by: invalid transaction id 'tx-42'"));
}

#[test]
fn cleanup_purges_finished_and_keeps_failed() {
    let fixture = populated_log();

    federation_admin!()
        .args(["cleanup", "--older-than-hours", "0", "--log"])
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("Purged 1 finished transaction(s)"));

    federation_admin!()
        .arg("list")
        .arg("--log")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains(fixture.committed.to_string()).not())
        .stdout(contains(fixture.failed.to_string()))
        .stdout(contains("2 transaction(s)"));
}

#[test]
fn cleanup_keeps_recent_records() {
    let fixture = populated_log();

    federation_admin!()
        .arg("cleanup")
        .arg("--log")
        .arg(fixture.path())
        .assert()
        .success()
        .stdout(contains("Nothing to purge."));
}

#[test]
fn missing_log_is_an_error() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("nowhere.log");

    federation_admin!()
        .arg("list")
        .arg("--log")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error: no transaction log at"));

    assert!(!path.exists());
}

#[test]
fn log_path_is_taken_from_config() {
    let fixture = populated_log();
    let config = fixture.dir.path().join("coordinator.toml");
    fs::write(
        &config,
        format!("[log]\npath = {:?}\n", fixture.path().display().to_string()),
    )
    .expect("write config");

    federation_admin!()
        .arg("incomplete")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains(fixture.pending.to_string()));
}
