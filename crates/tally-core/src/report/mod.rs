//! Reconciliation reports.
//!
//! Reports never write. Each one is a pure function over a [`Snapshot`]
//! (or plain slices), so the same code serves the CLI, exporters, and
//! benchmarks. A snapshot is read inside one deferred transaction, which in
//! WAL mode sees a single committed state and does not block writers.

pub mod detail;
pub mod risk;
pub mod rollup;
pub mod variance;

pub use detail::{ChangeOrderDetail, change_order_detail};
pub use risk::{OVERDUE_THRESHOLD_DAYS, ValueAtRiskReport, value_at_risk};
pub use rollup::{ProjectRollup, rollup_by_project};
pub use variance::{Variance, calculate_variance};

use crate::db::query::{self, Assignment, ChangeOrderFilter, TicketFilter};
use crate::error::Result;
use crate::model::{ChangeOrder, Project, ProjectId, Ticket};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

/// Everything the portfolio reports read, from one consistent view.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub projects: Vec<Project>,
    pub tickets: Vec<Ticket>,
    pub change_orders: Vec<ChangeOrder>,
}

impl Snapshot {
    /// Read all projects, tickets, and change orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn load(conn: &Connection) -> Result<Self> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
        let snapshot = Self {
            projects: query::list_projects(&tx, false)?,
            tickets: query::list_tickets(&tx, &TicketFilter::default())?,
            change_orders: query::list_change_orders(&tx, &ChangeOrderFilter::default())?,
        };
        tx.commit()?;

        debug!(
            projects = snapshot.projects.len(),
            tickets = snapshot.tickets.len(),
            change_orders = snapshot.change_orders.len(),
            "loaded report snapshot"
        );
        Ok(snapshot)
    }

    /// Value-at-risk as of `now`.
    #[must_use]
    pub fn value_at_risk(&self, now: DateTime<Utc>) -> ValueAtRiskReport {
        value_at_risk(&self.tickets, &self.change_orders, &self.projects, now)
    }

    /// Change order totals per project.
    #[must_use]
    pub fn rollup(&self) -> Vec<ProjectRollup> {
        rollup_by_project(&self.change_orders, &self.projects)
    }
}

/// Tickets not linked to any change order, oldest first, optionally for one
/// project.
///
/// # Errors
///
/// Returns an error if the backing store fails.
pub fn unassigned_tickets(conn: &Connection, project_id: Option<ProjectId>) -> Result<Vec<Ticket>> {
    query::list_tickets(
        conn,
        &TicketFilter {
            project_id,
            assignment: Assignment::Unassigned,
            ..TicketFilter::default()
        },
    )
}
