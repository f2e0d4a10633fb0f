use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("acs").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("acs"));
}

#[test]
fn get_requires_geography() {
    let mut cmd = Command::cargo_bin("acs").unwrap();
    cmd.args(["get", "--variables", "B01001_001"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--geography"));
}

#[test]
fn missing_key_fails_before_any_request() {
    let mut cmd = Command::cargo_bin("acs").unwrap();
    cmd.env_remove("CENSUS_API_KEY");
    cmd.args(["get", "--geography", "state", "--variables", "B01001_001"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Census API key is required"));
}

#[test]
fn variables_and_table_are_exclusive() {
    let mut cmd = Command::cargo_bin("acs").unwrap();
    cmd.args([
        "get",
        "--geography",
        "state",
        "--variables",
        "B01001_001",
        "--table",
        "B01001",
        "--key",
        "dummy",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot be combined"));
}

#[test]
fn malformed_alias_is_rejected() {
    let mut cmd = Command::cargo_bin("acs").unwrap();
    cmd.args(["get", "--geography", "state", "--alias", "B01001_001", "--key", "dummy"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected name=CODE"));
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn fetch_online_state_population() {
    let mut cmd = Command::cargo_bin("acs").unwrap();
    cmd.args([
        "get",
        "--geography",
        "state",
        "--variables",
        "B01001_001",
        "--state",
        "CA",
        "--output",
        "wide",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("California"));
}
