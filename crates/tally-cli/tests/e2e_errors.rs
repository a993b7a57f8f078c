//! E2E CLI tests for refused operations:
//! - stable error codes on stderr (`E1001`, `E2001`-`E2004`)
//! - non-zero exit status
//! - stored state unchanged after a refusal

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn tally(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
    cmd.current_dir(dir);
    cmd.env("TALLY_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = tally(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Run a command expected to fail and return its stderr.
fn run_failing(dir: &Path, args: &[&str]) -> String {
    let output = tally(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(!output.status.success(), "{args:?} unexpectedly succeeded");
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Workspace with project P1, one ticket, and a submitted change order.
fn submitted_fixture() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let d = dir.path();
    tally(d).arg("init").assert().success();
    run_json(d, &["project", "add", "P1", "Clinic"]);
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "400"]);
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "50"]);
    run_json(d, &["co", "create", "--project", "P1", "--title", "Outlets"]);
    run_json(d, &["co", "add", "co-1", "t-1"]);
    run_json(d, &["co", "submit", "co-1"]);
    dir
}

#[test]
fn commands_outside_workspace_report_not_initialized() {
    let dir = TempDir::new().expect("temp dir");
    tally(dir.path())
        .args(["ticket", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn add_to_submitted_is_invalid_state() {
    let dir = submitted_fixture();
    let d = dir.path();

    let stderr = run_failing(d, &["co", "add", "co-1", "t-2"]);
    assert!(stderr.contains("E2003"), "stderr: {stderr}");
    assert!(stderr.contains("invalid_state"), "stderr: {stderr}");

    let ticket = run_json(d, &["ticket", "show", "t-2"]);
    assert!(ticket["change_order_id"].is_null());
}

#[test]
fn submitted_change_order_cannot_be_edited_or_deleted() {
    let dir = submitted_fixture();
    let d = dir.path();

    assert!(run_failing(d, &["co", "remove", "co-1", "t-1"]).contains("E2003"));
    assert!(run_failing(d, &["co", "update", "co-1", "--title", "New"]).contains("E2003"));
    assert!(run_failing(d, &["co", "delete", "co-1"]).contains("E2003"));
    assert!(run_failing(d, &["co", "submit", "co-1"]).contains("E2003"));

    let co = run_json(d, &["co", "show", "co-1"]);
    assert_eq!(co["change_order"]["status"], "submitted");
    assert_eq!(co["tickets"].as_array().map(Vec::len), Some(1));
}

#[test]
fn decided_change_order_is_final() {
    let dir = submitted_fixture();
    let d = dir.path();
    run_json(d, &["co", "approve", "co-1", "--by", "Owner"]);

    assert!(run_failing(d, &["co", "reject", "co-1", "--by", "Owner"]).contains("E2003"));
    assert!(run_failing(d, &["co", "approve", "co-1", "--by", "Owner"]).contains("E2003"));
}

#[test]
fn ticket_on_another_change_order_is_a_conflict() {
    let dir = submitted_fixture();
    let d = dir.path();
    run_json(d, &["co", "create", "--project", "P1", "--title", "Second"]);

    let stderr = run_failing(d, &["co", "add", "co-2", "t-1"]);
    assert!(stderr.contains("E2004"), "stderr: {stderr}");

    let second = run_json(d, &["co", "show", "co-2"]);
    assert_eq!(second["tickets"].as_array().map(Vec::len), Some(0));
}

#[test]
fn unknown_records_are_not_found() {
    let dir = submitted_fixture();
    let d = dir.path();

    assert!(run_failing(d, &["co", "show", "co-99"]).contains("E2002"));
    assert!(run_failing(d, &["ticket", "show", "t-99"]).contains("E2002"));
    assert!(run_failing(d, &["co", "list", "--project", "NOPE"]).contains("E2002"));
}

#[test]
fn empty_draft_cannot_be_submitted() {
    let dir = submitted_fixture();
    let d = dir.path();
    run_json(d, &["co", "create", "--project", "P1", "--title", "Empty"]);

    assert!(run_failing(d, &["co", "submit", "co-2"]).contains("E2003"));
}

#[test]
fn blank_title_is_a_validation_error() {
    let dir = submitted_fixture();
    let d = dir.path();

    let stderr = run_failing(d, &["co", "create", "--project", "P1", "--title", "  "]);
    assert!(stderr.contains("E2001"));
}

#[test]
fn ticket_lifecycle_refuses_skipping_review() {
    let dir = submitted_fixture();
    let d = dir.path();

    assert!(run_failing(d, &["ticket", "status", "t-2", "paid"]).contains("E2003"));
    let approved = run_json(d, &["ticket", "status", "t-2", "approved"]);
    assert_eq!(approved["status"], "approved");
}

#[test]
fn human_errors_show_code_and_suggestion() {
    let dir = submitted_fixture();
    tally(dir.path())
        .args(["--format", "text", "co", "add", "co-1", "t-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2003]"))
        .stderr(predicate::str::contains("suggestion:"));
}

#[test]
fn oversized_ticket_amount_is_a_validation_error() {
    let dir = submitted_fixture();
    let d = dir.path();

    let stderr = run_failing(
        d,
        &[
            "ticket",
            "create",
            "--project",
            "P1",
            "--labor",
            "79228162514264337593543950335",
            "--materials",
            "79228162514264337593543950335",
        ],
    );
    assert!(stderr.contains("E2001"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"), "stderr: {stderr}");

    let tickets = run_json(d, &["ticket", "list"]);
    assert_eq!(tickets.as_array().map(Vec::len), Some(2));
}

#[test]
fn update_without_changes_is_a_validation_error() {
    let dir = TempDir::new().expect("temp dir");
    let d = dir.path();
    tally(d).arg("init").assert().success();
    run_json(d, &["project", "add", "P1", "Clinic"]);
    run_json(d, &["co", "create", "--project", "P1", "--title", "Outlets"]);

    let stderr = run_failing(d, &["co", "update", "co-1"]);
    assert!(stderr.contains("E2001"), "stderr: {stderr}");
}
