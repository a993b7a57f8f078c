//! E2E CLI tests covering the change order lifecycle:
//! - `tally init`, `tally project add`, `tally ticket create`
//! - `tally co create/add/remove/submit/approve/reject/delete`
//! - JSON contracts for amounts, membership, and decisions
//!
//! Each test runs the `tally` binary as a subprocess in an isolated temp
//! directory.

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

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

fn setup() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    tally(dir.path()).arg("init").assert().success();
    run_json(dir.path(), &["project", "add", "P1", "Clinic fit-out"]);
    dir
}

fn create_ticket(dir: &Path, labor: &str, materials: &str) -> i64 {
    let json = run_json(
        dir,
        &[
            "ticket", "create", "--project", "P1", "--labor", labor, "--materials", materials,
        ],
    );
    json["id"].as_i64().expect("ticket id")
}

fn amount(value: &Value) -> f64 {
    value
        .as_str()
        .expect("amounts serialize as strings")
        .parse()
        .expect("amount parses")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn full_lifecycle_draft_to_approved() {
    let dir = setup();
    let d = dir.path();
    let t1 = create_ticket(d, "500", "100");
    let t2 = create_ticket(d, "200", "0");

    let co = run_json(d, &["co", "create", "--project", "P1", "--title", "Added outlets"]);
    let co_id = co["id"].as_i64().expect("co id").to_string();
    assert_eq!(co["status"], "draft");
    assert_eq!(co["number"], 1);
    assert!(amount(&co["current_amount"]).abs() < f64::EPSILON);

    let added = run_json(d, &["co", "add", &co_id, &t1.to_string(), &t2.to_string()]);
    assert_eq!(added["added"].as_array().map(Vec::len), Some(2));
    assert!((amount(&added["change_order"]["current_amount"]) - 800.0).abs() < 1e-9);

    let submitted = run_json(d, &["co", "submit", &co_id]);
    assert_eq!(submitted["status"], "submitted");
    assert!((amount(&submitted["original_amount"]) - 800.0).abs() < 1e-9);
    assert!(submitted["submitted_at"].is_string());

    let approved = run_json(d, &["co", "approve", &co_id, "--by", "Owner PM"]);
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["approved_by"], "Owner PM");
    assert!((amount(&approved["original_amount"]) - 800.0).abs() < 1e-9);

    let detail = run_json(d, &["co", "show", &co_id]);
    assert_eq!(detail["tickets"].as_array().map(Vec::len), Some(2));
    assert_eq!(detail["project"]["code"], "P1");
    assert!(amount(&detail["variance"]["amount"]).abs() < f64::EPSILON);
}

#[test]
fn remove_recomputes_current_amount() {
    let dir = setup();
    let d = dir.path();
    let t1 = create_ticket(d, "500", "100");
    let t2 = create_ticket(d, "200", "0");

    run_json(d, &["co", "create", "--project", "P1", "--title", "Extra"]);
    run_json(d, &["co", "add", "1", &t1.to_string(), &t2.to_string()]);

    let after = run_json(d, &["co", "remove", "co-1", &format!("t-{t1}")]);
    assert!((amount(&after["current_amount"]) - 200.0).abs() < 1e-9);

    let tickets = run_json(d, &["ticket", "list", "--unassigned"]);
    let ids: Vec<i64> = tickets
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|t| t["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![t1]);
}

#[test]
fn reject_records_who_and_keeps_original() {
    let dir = setup();
    let d = dir.path();
    let t1 = create_ticket(d, "300", "0");

    run_json(d, &["co", "create", "--project", "P1", "--title", "Extra"]);
    run_json(d, &["co", "add", "co-1", &t1.to_string()]);
    run_json(d, &["co", "submit", "co-1"]);

    let rejected = run_json(d, &["co", "reject", "co-1", "--by", "Owner PM"]);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["rejected_by"], "Owner PM");
    assert!(rejected["approved_by"].is_null());
    assert!((amount(&rejected["original_amount"]) - 300.0).abs() < 1e-9);
}

#[test]
fn delete_draft_releases_tickets() {
    let dir = setup();
    let d = dir.path();
    let t1 = create_ticket(d, "300", "0");

    run_json(d, &["co", "create", "--project", "P1", "--title", "Scrap"]);
    run_json(d, &["co", "add", "co-1", &t1.to_string()]);

    let deleted = run_json(d, &["co", "delete", "co-1"]);
    assert_eq!(deleted["released"], serde_json::json!([t1]));

    let ticket = run_json(d, &["ticket", "show", &t1.to_string()]);
    assert!(ticket["change_order_id"].is_null());

    let cos = run_json(d, &["co", "list"]);
    assert_eq!(cos.as_array().map(Vec::len), Some(0));
}

#[test]
fn update_edits_title_and_clears_notes() {
    let dir = setup();
    let d = dir.path();
    run_json(
        d,
        &["co", "create", "--project", "P1", "--title", "Outlets", "--notes", "east wing"],
    );

    let updated = run_json(d, &["co", "update", "co-1", "--title", "Outlets and data"]);
    assert_eq!(updated["title"], "Outlets and data");
    assert_eq!(updated["notes"], "east wing");

    let cleared = run_json(d, &["co", "update", "co-1", "--clear-notes"]);
    assert!(cleared["notes"].is_null());
}

#[test]
fn change_order_numbers_count_per_project() {
    let dir = setup();
    let d = dir.path();
    run_json(d, &["project", "add", "P2", "Warehouse"]);

    let a = run_json(d, &["co", "create", "--project", "P1", "--title", "A"]);
    let b = run_json(d, &["co", "create", "--project", "P1", "--title", "B"]);
    let c = run_json(d, &["co", "create", "--project", "P2", "--title", "C"]);
    assert_eq!(a["number"], 1);
    assert_eq!(b["number"], 2);
    assert_eq!(c["number"], 1);

    let p2 = run_json(d, &["co", "list", "--project", "P2"]);
    assert_eq!(p2.as_array().map(Vec::len), Some(1));
}

#[test]
fn text_output_is_tab_separated() {
    let dir = setup();
    let d = dir.path();
    create_ticket(d, "500", "100");

    tally(d)
        .args(["--format", "text", "ticket", "list"])
        .assert()
        .success()
        .stdout(predicates::str::contains("pending_review\t600"));
}
