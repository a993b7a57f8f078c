//! E2E CLI tests covering:
//! - `tally ticket import` from extractor JSON (stdin and file)
//! - `tally report risk`, `tally report rollup`, `tally report unassigned`

use assert_cmd::Command;
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

fn amount(value: &Value) -> f64 {
    value
        .as_str()
        .expect("amounts serialize as strings")
        .parse()
        .expect("amount parses")
}

fn workspace() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    tally(dir.path()).arg("init").assert().success();
    run_json(dir.path(), &["project", "add", "P1", "Clinic"]);
    dir
}

const EXTRACTED: &str = r#"{
    "date": "2026-03-02",
    "description": "Pulled new circuit to exam room 4",
    "labor": [{"classification": "Electrician", "workers": 2, "hours": "8", "rate": 85}],
    "materials": {"description": "12/2 wire", "quantity": 10, "unit": "box", "unit_cost": "$12.50"},
    "cost_code": "26-0500"
}"#;

#[test]
fn import_prices_extractor_output_from_stdin() {
    let dir = workspace();
    let output = tally(dir.path())
        .args(["ticket", "import", "--project", "P1", "--json"])
        .write_stdin(EXTRACTED)
        .output()
        .expect("import should not crash");
    assert!(
        output.status.success(),
        "import failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let created = report["created"].as_array().expect("created array");
    assert_eq!(created.len(), 1);
    let ticket = &created[0];
    assert!((amount(&ticket["labor_total"]) - 1360.0).abs() < 1e-9);
    assert!((amount(&ticket["materials_total"]) - 125.0).abs() < 1e-9);
    assert!((amount(&ticket["total_amount"]) - 1485.0).abs() < 1e-9);
    assert_eq!(ticket["status"], "pending_review");
    assert_eq!(ticket["work_date"], "2026-03-02");
    assert_eq!(ticket["cost_code"], "26-0500");
}

#[test]
fn import_uses_labor_rate_flag_and_reports_warnings() {
    let dir = workspace();
    let file = dir.path().join("capture.json");
    std::fs::write(
        &file,
        r#"[{"labor": {"trade": "Laborer", "hours": 4}, "date": "sometime last week"}]"#,
    )
    .expect("write capture");

    let report = run_json(
        dir.path(),
        &[
            "ticket",
            "import",
            "--project",
            "P1",
            "--labor-rate",
            "60",
            file.to_str().expect("utf8 path"),
        ],
    );
    assert!((amount(&report["created"][0]["total_amount"]) - 240.0).abs() < 1e-9);
    assert!(report["created"][0]["work_date"].is_null());
    assert_eq!(report["warnings"].as_array().map(Vec::len), Some(1));
}

#[test]
fn import_without_any_rate_creates_nothing() {
    let dir = workspace();
    let output = tally(dir.path())
        .args(["ticket", "import", "--project", "P1", "--json"])
        .write_stdin(
            r#"[{"materials": [{"item": "anchors", "qty": 4, "price": 2}]},
                {"labor": {"hours": 3}}]"#,
        )
        .output()
        .expect("import should not crash");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("E2001"));

    let tickets = run_json(dir.path(), &["ticket", "list"]);
    assert_eq!(tickets.as_array().map(Vec::len), Some(0));
}

#[test]
fn risk_report_buckets_tickets_and_change_orders() {
    let dir = workspace();
    let d = dir.path();
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "500", "--materials", "100"]);
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "200"]);
    run_json(
        d,
        &["ticket", "create", "--project", "P1", "--labor", "50", "--status", "draft"],
    );
    run_json(d, &["co", "create", "--project", "P1", "--title", "Outlets"]);
    run_json(d, &["co", "add", "co-1", "t-1"]);
    run_json(d, &["co", "submit", "co-1"]);

    let risk = run_json(d, &["report", "risk"]);
    assert_eq!(risk["tickets"]["pending_review"]["count"], 2);
    assert_eq!(risk["tickets"]["draft"]["count"], 1);
    assert_eq!(risk["change_orders"]["submitted"]["count"], 1);
    assert!((amount(&risk["change_orders"]["submitted"]["value"]) - 600.0).abs() < 1e-9);
    assert!((amount(&risk["total_at_risk"]) - 1450.0).abs() < 1e-9);
    assert_eq!(risk["overdue"].as_array().map(Vec::len), Some(0));

    let by_project = risk["by_project"].as_array().expect("by_project");
    assert_eq!(by_project.len(), 1);
    assert_eq!(by_project[0]["project_code"], "P1");
    assert!((amount(&by_project[0]["total"]) - 850.0).abs() < 1e-9);
}

#[test]
fn rollup_reports_variance_per_project() {
    let dir = workspace();
    let d = dir.path();
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "1000"]);
    run_json(d, &["co", "create", "--project", "P1", "--title", "A"]);
    run_json(d, &["co", "add", "co-1", "t-1"]);
    run_json(d, &["co", "submit", "co-1"]);

    let rollup = run_json(d, &["report", "rollup"]);
    let rows = rollup.as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["change_orders"], 1);
    assert!((amount(&rows[0]["total_original"]) - 1000.0).abs() < 1e-9);
    assert!(amount(&rows[0]["total_variance"]).abs() < f64::EPSILON);
}

#[test]
fn unassigned_report_excludes_linked_tickets() {
    let dir = workspace();
    let d = dir.path();
    run_json(d, &["project", "add", "P2", "Warehouse"]);
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "100"]);
    run_json(d, &["ticket", "create", "--project", "P1", "--labor", "200"]);
    run_json(d, &["ticket", "create", "--project", "P2", "--labor", "300"]);
    run_json(d, &["co", "create", "--project", "P1", "--title", "A"]);
    run_json(d, &["co", "add", "co-1", "t-1"]);

    let all = run_json(d, &["report", "unassigned"]);
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let p1 = run_json(d, &["report", "unassigned", "--project", "P1"]);
    let ids: Vec<i64> = p1
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|t| t["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn pretty_risk_report_renders_sections() {
    let dir = workspace();
    tally(dir.path())
        .args(["--format", "pretty", "report", "risk"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Value at risk"))
        .stdout(predicates::str::contains("Overdue"));
}
