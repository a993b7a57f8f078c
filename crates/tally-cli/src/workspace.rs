//! Locate the `.tally` directory and open its database.

use crate::output::{CliError, OutputMode, render_error};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tally_core::config::{self, ProjectConfig, TALLY_DIR};
use tally_core::db::{self, DB_FILE_NAME, query};
use tally_core::error::{ErrorCode, TallyError};
use tally_core::model::money::format_amount;
use tally_core::model::{Project, ProjectId};

/// An opened tally workspace.
pub struct Workspace {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub conn: Connection,
}

impl Workspace {
    /// Walk up from `start` to the nearest directory holding `.tally/`.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(TALLY_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Path of the database file under `root`.
    pub fn db_path(root: &Path) -> PathBuf {
        root.join(TALLY_DIR).join(DB_FILE_NAME)
    }

    /// Open the workspace containing `start`.
    ///
    /// # Errors
    ///
    /// Renders and returns an error if no workspace is found, the config is
    /// unreadable, or the database cannot be opened.
    pub fn open(start: &Path, output: OutputMode) -> anyhow::Result<Self> {
        let Some(root) = Self::find_root(start) else {
            render_error(
                output,
                &CliError::from_code(
                    "no .tally directory found here or in any parent",
                    ErrorCode::NotInitialized,
                ),
            )?;
            anyhow::bail!("not a tally workspace: {}", start.display());
        };

        let config = match config::load_project_config(&root) {
            Ok(config) => config,
            Err(err) => {
                render_error(
                    output,
                    &CliError::from_code(format!("{err:#}"), ErrorCode::ConfigParseError),
                )?;
                return Err(err);
            }
        };

        let conn = match db::open_db(&Self::db_path(&root)) {
            Ok(conn) => conn,
            Err(err) => {
                render_error(
                    output,
                    &CliError::from_code(format!("{err:#}"), ErrorCode::StorageFailure),
                )?;
                return Err(err);
            }
        };

        tracing::debug!(root = %root.display(), "opened workspace");
        Ok(Self { root, config, conn })
    }

    /// Format an amount with the configured currency symbol.
    pub fn money(&self, amount: Decimal) -> String {
        format_amount(&self.config.report.currency, amount)
    }

    /// Resolve a project by code (case-insensitive) or id (`p-3` or `3`).
    ///
    /// # Errors
    ///
    /// `NotFound` if neither matches.
    pub fn project(&self, reference: &str) -> Result<Project, TallyError> {
        if let Some(project) = query::get_project_by_code(&self.conn, reference)? {
            return Ok(project);
        }
        if let Ok(id) = reference.parse::<ProjectId>() {
            if let Some(project) = query::get_project(&self.conn, id)? {
                return Ok(project);
            }
        }
        Err(TallyError::NotFound {
            entity: "project",
            id: reference.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Workspace;

    #[test]
    fn find_root_walks_up_to_tally_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(".tally")).expect("create .tally");
        let nested = dir.path().join("site/photos");
        std::fs::create_dir_all(&nested).expect("create nested");

        assert_eq!(Workspace::find_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn find_root_is_none_outside_a_workspace() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(Workspace::find_root(dir.path()).is_none());
    }
}
