//! Integration tests for the `switchboard` binary entry point.
//!
//! Everything here runs in inline mode against a temporary runtime
//! directory, so no worker process is involved.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn inline_command(sandbox: &TempDir) -> Command {
    let mut command = cargo_bin_cmd!("switchboard");
    command
        .arg("--daemon-socket")
        .arg(sandbox.path().join("run").join("switchboardd.sock"))
        .arg("--vfs-root")
        .arg(sandbox.path())
        .arg("--log-filter")
        .arg("warn")
        .arg("--inline");
    command
}

#[test]
fn help_succeeds() {
    let mut command = cargo_bin_cmd!("switchboard");
    command.arg("--help");
    command.assert().success().stdout(contains("--inline"));
}

#[test]
fn inline_ping_prints_the_reply() {
    let sandbox = TempDir::new().expect("temp dir");
    inline_command(&sandbox)
        .args(["--kind", "query", "--data", r#"{"payload":"hi"}"#, "Ping"])
        .assert()
        .success()
        .stdout(contains(r#""payload":"hi""#));
}

#[test]
fn inline_unknown_type_fails() {
    let sandbox = TempDir::new().expect("temp dir");
    inline_command(&sandbox)
        .arg("Shell.Exec")
        .assert()
        .failure()
        .stderr(contains("not_found"));
}

#[test]
fn inline_malformed_stdin_reports_a_protocol_error() {
    let sandbox = TempDir::new().expect("temp dir");
    inline_command(&sandbox)
        .write_stdin("{not json\n")
        .assert()
        .failure()
        .stdout(contains(r#""kind":"protocol""#))
        .stderr(contains("Protocol: protocol"));
}
