//! Integration tests for isspctl

use assert_cmd::Command;
use issp_test_helpers::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn isspctl() -> Result<Command, Box<dyn std::error::Error>> {
    Ok(Command::cargo_bin("isspctl")?)
}

/// Write an image plus a matching configuration
fn write_fixture(
    dir: &TempDir,
    builder: &ImageBuilder,
) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    let image = dir.path().join("js.fw");
    fs::write(&image, builder.to_bytes()?)?;

    let config = dir.path().join("issp.json");
    let config_value = builder.config().build()?;
    fs::write(&config, serde_json::to_string_pretty(&config_value)?)?;
    Ok((image, config))
}

#[test]
fn test_cli_help() -> TestResult {
    isspctl()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("inspect"));
    Ok(())
}

#[test]
fn test_inspect_valid_image_json() -> TestResult {
    let dir = TempDir::new()?;
    let builder = ImageBuilder::new().version(0x07).checksum(0xbeef);
    let (image, config) = write_fixture(&dir, &builder)?;

    let output = isspctl()?
        .args(["--json", "inspect"])
        .arg(&image)
        .arg("--config")
        .arg(&config)
        .output()?;
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["success"], true);
    assert_eq!(value["image"]["validation"]["device_version"], 7);
    assert_eq!(value["image"]["validation"]["checksum"], 0xbeef);
    Ok(())
}

#[test]
fn test_inspect_invalid_image_exit_code() -> TestResult {
    let dir = TempDir::new()?;
    let builder = ImageBuilder::new().without(Marker::Security);
    let (image, config) = write_fixture(&dir, &builder)?;

    isspctl()?
        .arg("inspect")
        .arg(&image)
        .arg("-c")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("security record"));
    Ok(())
}

#[test]
fn test_decide_newer_image() -> TestResult {
    let dir = TempDir::new()?;
    let builder = ImageBuilder::new().version(0x12);
    let (image, config) = write_fixture(&dir, &builder)?;

    let output = isspctl()?
        .args(["--json", "decide"])
        .arg(&image)
        .args(["--device-version", "0x10", "--config"])
        .arg(&config)
        .output()?;
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["decision"]["update"], true);
    assert_eq!(value["decision"]["reason"], "NewerImage");
    Ok(())
}

#[test]
fn test_decide_equal_versions_with_force() -> TestResult {
    let dir = TempDir::new()?;
    let builder = ImageBuilder::new().version(0x08);
    let (image, config) = write_fixture(&dir, &builder)?;

    isspctl()?
        .arg("decide")
        .arg(&image)
        .args(["-d", "8", "--force", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
    Ok(())
}

#[test]
fn test_decide_requires_device_state() -> TestResult {
    let dir = TempDir::new()?;
    let (image, config) = write_fixture(&dir, &ImageBuilder::new())?;

    isspctl()?
        .arg("decide")
        .arg(&image)
        .arg("-c")
        .arg(&config)
        .assert()
        .code(4);
    Ok(())
}

#[test]
fn test_config_check_rejects_bad_geometry() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{ "block_size": 0 }"#)?;

    isspctl()?
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid configuration"));
    Ok(())
}

#[test]
fn test_config_show_is_json() -> TestResult {
    let output = isspctl()?.args(["--json", "config", "show"]).output()?;
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["config"]["recovery"]["settle_ms"], 500);
    Ok(())
}
