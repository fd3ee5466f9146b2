use std::fs;

use predicates::str::contains;
use tempfile::TempDir;

macro_rules! federation_admin {
    () => {
        assert_cmd::cargo::cargo_bin_cmd!("federation-admin")
    };
}

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("coordinator.toml");
    fs::write(&path, content).expect("write config");
    path
}

#[test]
fn valid_config_is_summarized() {
    let dir = TempDir::new().expect("create temp dir");
    let path = write_config(
        &dir,
        r#"
[locks]
acquire-timeout-ms = 250

[compensation]
max-attempts = 4
strategy = "linear"

[log]
path = "/srv/federation/tx.log"
"#,
    );

    federation_admin!()
        .arg("check-config")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("Configuration OK"))
        .stdout(contains("lock acquire timeout:   250ms"))
        .stdout(contains("compensation retries:   4 (Linear"))
        .stdout(contains("/srv/federation/tx.log"));
}

#[test]
fn empty_config_uses_defaults() {
    let dir = TempDir::new().expect("create temp dir");
    let path = write_config(&dir, "");

    federation_admin!()
        .arg("check-config")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("step timeout:           5s"))
        .stdout(contains("federation-transactions.log"));
}

#[test]
fn invalid_value_is_reported() {
    let dir = TempDir::new().expect("create temp dir");
    let path = write_config(&dir, "[compensation]\nmax-attempts = 0\n");

    federation_admin!()
        .arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error: configuration error"))
        .stderr(contains("max-attempts"));
}

#[test]
fn unknown_key_is_reported_with_path() {
    let dir = TempDir::new().expect("create temp dir");
    let path = write_config(&dir, "[locks]\ntimeout = 5\n");

    federation_admin!()
        .arg("check-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains(path.display().to_string()))
        .stderr(contains("timeout"));
}
