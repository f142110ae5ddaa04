// ABOUTME: Integration tests for the rollwatch CLI commands.
// ABOUTME: Validates --help, init, validate, and simulated rollouts end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn rollwatch_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("rollwatch"))
}

const FAST_CONFIG: &str = r#"
service: enrichment-api
revision: { env: ROLLWATCH_TEST_REVISION, default: dev }
image: registry.example.com/enrichment-api:latest
replicas: 2
rollout:
  tick: 50ms
probes:
  liveness: { interval: 100ms, timeout: 50ms }
  readiness: { interval: 100ms, timeout: 50ms }
backend:
  kind: simulated
"#;

fn write_config(dir: &Path) {
    fs::write(dir.join("rollwatch.yml"), FAST_CONFIG).unwrap();
}

/// A rollout command isolated to `dir`, lock files included.
fn rollout_cmd(dir: &Path) -> Command {
    let mut cmd = rollwatch_cmd();
    cmd.current_dir(dir)
        .env("XDG_STATE_HOME", dir.join("state"))
        .write_stdin("");
    cmd
}

#[test]
fn help_shows_commands() {
    rollwatch_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("rollout"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("rollwatch.yml");

    rollwatch_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--service", "checkout"])
        .assert()
        .success();

    assert!(config_path.exists(), "rollwatch.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("service: checkout"));
    assert!(content.contains("probes:"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("rollwatch.yml");

    fs::write(&config_path, "existing: config").unwrap();

    rollwatch_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn validate_prints_resolved_budgets() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path());

    rollwatch_cmd()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Max surge:     1"))
        .stdout(predicate::str::contains("Min available: 2"))
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn validate_rejects_zero_surge() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("rollwatch.yml"),
        "service: api\nrevision: v1\nimage: api:v1\nrollout:\n  max_surge: 0\n",
    )
    .unwrap();

    rollwatch_cmd()
        .current_dir(temp_dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_surge"));
}

#[test]
fn simulated_rollout_succeeds() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path());

    rollout_cmd(temp_dir.path())
        .args(["rollout", "--revision", "3f2c1ab"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolling out enrichment-api"))
        .stdout(predicate::str::contains("Rolled out enrichment-api 3f2c1ab"));
}

#[test]
fn simulated_rollout_emits_json_events() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path());

    rollout_cmd(temp_dir.path())
        .args(["--json", "rollout", "--simulate", "--replicas", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"rollout_started""#))
        .stdout(predicate::str::contains(r#""event":"rollout_succeeded""#))
        .stdout(predicate::str::contains(r#""replicas":3"#));
}

#[test]
fn failing_pre_rollout_hook_stops_rollout() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path());

    let hooks_dir = temp_dir.path().join(".rollwatch").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();
    let hook = hooks_dir.join("pre-rollout");
    fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

    rollout_cmd(temp_dir.path())
        .args(["--quiet", "rollout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pre-rollout hook failed"));
}
