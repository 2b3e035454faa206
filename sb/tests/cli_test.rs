//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sb(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sb").expect("sb binary should build");
    cmd.current_dir(dir.path()).env("XDG_DATA_HOME", dir.path()).env("HOME", dir.path());
    cmd
}

#[test]
fn test_signals_lists_wire_names() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    sb(&dir)
        .arg("signals")
        .assert()
        .success()
        .stdout(predicate::str::contains("fg-gifts:updated"))
        .stdout(predicate::str::contains("bogos:bundle-page-init"));
}

#[test]
fn test_config_prints_yaml() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    sb(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("first-check-delay-ms: 500"))
        .stdout(predicate::str::contains("cart-id: cart-aside"));
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("custom.yml");
    std::fs::write(&path, "signals:\n  gifts-updated: promo:gifts-changed\n").expect("Failed to write config");

    sb(&dir)
        .args(["--config", path.to_str().expect("utf-8 path"), "signals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("promo:gifts-changed"));
}

#[test]
fn test_simulate_scenario_file_as_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("bundle.yml");
    std::fs::write(
        &path,
        "name: bundle\nroute: /bundle-page/offer-9\nruntime-appears-ms: 0\nsignals: []\nsearches: []\nduration-ms: 600\n",
    )
    .expect("Failed to write scenario");

    sb(&dir)
        .args(["simulate", "--scenario", path.to_str().expect("utf-8 path"), "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bundle-inits\""))
        .stdout(predicate::str::contains("offer-9"));
}

#[test]
fn test_simulate_missing_scenario_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    sb(&dir)
        .args(["simulate", "--scenario", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read scenario"));
}
