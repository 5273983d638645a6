//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::prelude::OutputAssertExt;
use predicates::prelude::*;

#[test]
fn cli_without_arguments_prints_help() {
    let mut cmd = cargo_bin_cmd!("pve-content");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage: pve-content"));
}

#[test]
fn help_lists_every_operation() {
    let mut cmd = cargo_bin_cmd!("pve-content");
    let assert = cmd.arg("--help").assert().success();
    for subcommand in [
        "upload",
        "download-url",
        "show",
        "delete",
        "scp-upload",
        "task-status",
    ] {
        assert.get_output().clone().assert().stdout(predicate::str::contains(subcommand));
    }
}

#[test]
fn missing_configuration_is_reported_with_its_source() {
    let tmp = tempfile::TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("pve-content");
    cmd.current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env_remove("PVE_CONTENT_CONFIG_PATH")
        .env_remove("PVE_TOKEN_ID")
        .env_remove("PVE_TOKEN_SECRET")
        .env_remove("PVE_NODE")
        .env("PVE_API_URL", "")
        .args(["show", "--content", "iso", "ubuntu.iso"])
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("configuration"));
}
