use crate::output::{OutputMode, render};
use crate::workspace::Workspace;
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use tally_core::config::{TALLY_DIR, starter_project_config};
use tally_core::db::{self, migrations};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config template even if `.tally/` already exists.
    /// Existing tickets and change orders are kept.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "tally.sqlite3\ntally.sqlite3-wal\ntally.sqlite3-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    root: String,
    database: String,
    config: String,
    schema_version: u32,
}

/// Execute `tally init`. Creates the workspace skeleton:
///
/// ```text
/// .tally/
///   tally.sqlite3   (migrated database)
///   config.toml     (project config template)
///   .gitignore      (database files)
/// ```
///
/// # Errors
///
/// Returns an error if `.tally/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let tally_dir = project_root.join(TALLY_DIR);

    if tally_dir.exists() && !args.force {
        anyhow::bail!(".tally/ already exists. Use `tally init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&tally_dir)
        .with_context(|| format!("Failed to create {}", tally_dir.display()))?;

    let config_path = tally_dir.join("config.toml");
    std::fs::write(&config_path, starter_project_config())
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = tally_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = Workspace::db_path(project_root);
    let conn = db::open_db(&db_path)?;
    let schema_version = migrations::current_schema_version(&conn)?;

    let report = InitReport {
        root: project_root.display().to_string(),
        database: db_path.display().to_string(),
        config: config_path.display().to_string(),
        schema_version,
    };

    render(output, &report, |report, w| {
        writeln!(w, "Initialized .tally/ in {}", report.root)?;
        writeln!(w)?;
        writeln!(w, "  Database: .tally/tally.sqlite3 (schema v{})", report.schema_version)?;
        writeln!(w, "  Config:   .tally/config.toml")?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  tally project add P1 \"Clinic fit-out\"")?;
        writeln!(w, "  tally ticket create --project P1 --labor 500")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_init_creates_structure() {
        let root = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, root.path()).expect("init");

        assert!(root.path().join(".tally").is_dir());
        assert!(root.path().join(".tally/config.toml").is_file());
        assert!(root.path().join(".tally/.gitignore").is_file());
        assert!(root.path().join(".tally/tally.sqlite3").is_file());
    }

    #[test]
    fn reinit_without_force_fails() {
        let root = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, root.path()).expect("first init");

        let result = run_init(&InitArgs { force: false }, OutputMode::Json, root.path());
        assert!(result.is_err(), "reinit without --force must fail");
    }

    #[test]
    fn reinit_with_force_keeps_data() {
        let root = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, root.path()).expect("first init");

        let conn = db::open_db(&Workspace::db_path(root.path())).expect("open");
        conn.execute(
            "INSERT INTO projects (code, name, budget, is_active, created_at_us)
             VALUES ('P1', 'Clinic', '0', 1, 0)",
            [],
        )
        .expect("insert");
        drop(conn);

        run_init(&InitArgs { force: true }, OutputMode::Json, root.path()).expect("force init");
        let conn = db::open_db(&Workspace::db_path(root.path())).expect("reopen");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
