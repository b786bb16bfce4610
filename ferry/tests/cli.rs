use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn ferry(dir: &std::path::Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ferry")?;
    cmd.current_dir(dir)
        .env_remove("TARGET_USER")
        .env_remove("TARGET_PASSWORD")
        .env_remove("RUST_LOG")
        .env_remove("LOG_LEVEL")
        .env_remove("LOG_REPOS")
        .env("LOG_OUTPUT", "console");
    Ok(cmd)
}

#[test]
fn test_help_lists_sync_flags() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    ferry(temp_dir.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--history-dir"));
    Ok(())
}

#[test]
fn test_missing_items_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    ferry(temp_dir.path())?
        .args(["--config", "absent.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load items file"));
    Ok(())
}

#[test]
fn test_missing_credentials_fail_before_any_sync() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(
        temp_dir.path().join("items.yml"),
        "etcd:\n  source: quay.io/coreos/\n  target: registry.example.com/mirror/\n  tag:\n    limit: 2\n",
    )?;

    ferry(temp_dir.path())?
        .assert()
        .failure()
        .stderr(predicate::str::contains("TARGET_USER"));
    assert!(!temp_dir.path().join("history").exists());
    Ok(())
}

#[test]
fn test_dry_run_with_no_items_creates_history_dir() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("items.yml"), "")?;

    ferry(temp_dir.path())?.arg("--dry-run").assert().success();
    assert!(temp_dir.path().join("history").is_dir());
    Ok(())
}

#[test]
fn test_unsupported_source_sets_failure_status() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    fs::write(
        temp_dir.path().join("mirror.yml"),
        "internal:\n  source: registry.corp.example/team/\n  target: registry.example.com/mirror/\n  tag:\n    limit: 2\n",
    )?;

    ferry(temp_dir.path())?
        .args(["--config", "mirror.yml", "--dry-run"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unsupported sync source"));
    Ok(())
}
