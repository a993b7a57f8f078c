//! Ticket store and project directory.
//!
//! Tickets arrive from the capture workflow with their labor and material
//! totals already priced; the store validates them, fixes `total_amount`,
//! and owns ticket status edits. Change order membership is written only by
//! [`crate::engine::ChangeOrderEngine`].

use crate::clock::{Clock, SystemClock};
use crate::db::query::{self, TicketFilter, decimal_text, to_micros};
use crate::error::{Result, TallyError};
use crate::model::{NewProject, NewTicket, Project, ProjectId, Ticket, TicketId, TicketStatus};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

/// Read access to the project directory.
pub trait ProjectSource {
    /// Projects currently open for billing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get_active_projects(&self) -> Result<Vec<Project>>;

    /// Look up one project, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn project(&self, id: ProjectId) -> Result<Option<Project>>;
}

impl ProjectSource for Connection {
    fn get_active_projects(&self) -> Result<Vec<Project>> {
        query::list_projects(self, true)
    }

    fn project(&self, id: ProjectId) -> Result<Option<Project>> {
        query::get_project(self, id)
    }
}

/// Resolve a project that a new ticket or change order will reference.
///
/// # Errors
///
/// `NotFound` if `source` has no such project.
pub(crate) fn require_project(source: &impl ProjectSource, id: ProjectId) -> Result<Project> {
    source
        .project(id)?
        .ok_or_else(|| TallyError::not_found("project", id))
}

/// Ticket and project writes against one connection.
pub struct TicketStore<'conn, C = SystemClock> {
    conn: &'conn Connection,
    clock: C,
}

impl<'conn> TicketStore<'conn> {
    /// Create a store that stamps rows with the system clock.
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            clock: SystemClock,
        }
    }
}

impl<'conn, C: Clock> TicketStore<'conn, C> {
    /// Create a store with an explicit clock.
    pub const fn with_clock(conn: &'conn Connection, clock: C) -> Self {
        Self { conn, clock }
    }

    fn begin(&self) -> Result<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Register a project.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank code/name or negative budget, `Conflict` if
    /// the code is taken.
    pub fn create_project(&self, new: &NewProject) -> Result<Project> {
        let code = new.code.trim();
        let name = new.name.trim();
        if code.is_empty() {
            return Err(TallyError::validation("project code is required"));
        }
        if name.is_empty() {
            return Err(TallyError::validation("project name is required"));
        }
        if new.budget.is_sign_negative() && !new.budget.is_zero() {
            return Err(TallyError::validation(format!(
                "project budget must not be negative (got {})",
                new.budget
            )));
        }

        let tx = self.begin()?;
        if query::get_project_by_code(&tx, code)?.is_some() {
            return Err(TallyError::conflict(format!(
                "project code '{code}' already exists"
            )));
        }
        tx.execute(
            "INSERT INTO projects (code, name, budget, is_active, created_at_us)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![code, name, decimal_text(new.budget), to_micros(self.clock.now())],
        )?;
        let id = ProjectId(tx.last_insert_rowid());
        let project = require_project(&*tx, id)?;
        tx.commit()?;

        info!(project_id = %id, code, "project registered");
        Ok(project)
    }

    /// Mark a project active or closed.
    ///
    /// Closed projects drop out of `get_active_projects`. Their tickets and
    /// change orders are untouched and stay editable.
    ///
    /// # Errors
    ///
    /// `NotFound` if the project does not exist.
    pub fn set_project_active(&self, id: ProjectId, active: bool) -> Result<Project> {
        let tx = self.begin()?;
        let changed = tx.execute(
            "UPDATE projects SET is_active = ?1 WHERE project_id = ?2",
            params![active, id.get()],
        )?;
        if changed == 0 {
            return Err(TallyError::not_found("project", id));
        }
        let project = require_project(&*tx, id)?;
        tx.commit()?;
        Ok(project)
    }

    /// Store a new ticket, fixing `total_amount = labor_total + materials_total`.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing project, or an amount that is negative or
    /// above `MAX_TICKET_AMOUNT`. `NotFound` if the project does not exist.
    pub fn create_ticket(&self, new: &NewTicket) -> Result<Ticket> {
        let project_id = new.validate().map_err(TallyError::Validation)?;
        let total = new
            .total_amount()
            .ok_or_else(|| TallyError::validation("ticket total is out of range"))?;

        let tx = self.begin()?;
        require_project(&*tx, project_id)?;

        let now = to_micros(self.clock.now());
        tx.execute(
            "INSERT INTO tickets (
                project_id, status, work_date, description, location, cost_code,
                labor_total, materials_total, total_amount, co_id, created_at_us, updated_at_us
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?10)",
            params![
                project_id.get(),
                new.status.as_str(),
                new.work_date.map(|d| d.format("%Y-%m-%d").to_string()),
                non_blank(new.description.as_deref()),
                non_blank(new.location.as_deref()),
                non_blank(new.cost_code.as_deref()),
                decimal_text(new.labor_total),
                decimal_text(new.materials_total),
                decimal_text(total),
                now,
            ],
        )?;
        let id = TicketId(tx.last_insert_rowid());
        let ticket = load_ticket(&tx, id)?;
        tx.commit()?;

        info!(ticket_id = %id, project_id = %project_id, total = %total, "ticket created");
        Ok(ticket)
    }

    /// Fetch a ticket.
    ///
    /// # Errors
    ///
    /// `NotFound` if the ticket does not exist.
    pub fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        query::get_ticket(self.conn, id)?.ok_or_else(|| TallyError::not_found("ticket", id))
    }

    /// List tickets matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        let tickets = query::list_tickets(self.conn, filter)?;
        debug!(count = tickets.len(), "listed tickets");
        Ok(tickets)
    }

    /// Move a ticket through its own lifecycle.
    ///
    /// Ticket status is independent of change order status, so this never
    /// touches membership or change order amounts.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ticket, `InvalidState` when the ticket
    /// lifecycle does not allow the move.
    pub fn set_ticket_status(&self, id: TicketId, target: TicketStatus) -> Result<Ticket> {
        let tx = self.begin()?;
        let ticket = load_ticket(&tx, id)?;

        ticket
            .status
            .can_transition_to(target)
            .map_err(|e| TallyError::invalid_state(format!("ticket {id}: {e}")))?;

        tx.execute(
            "UPDATE tickets SET status = ?1, updated_at_us = ?2 WHERE ticket_id = ?3",
            params![target.as_str(), to_micros(self.clock.now()), id.get()],
        )?;
        let updated = load_ticket(&tx, id)?;
        tx.commit()?;

        info!(ticket_id = %id, from = %ticket.status, to = %target, "ticket status changed");
        Ok(updated)
    }
}

fn load_ticket(conn: &Connection, id: TicketId) -> Result<Ticket> {
    query::get_ticket(conn, id)?.ok_or_else(|| TallyError::not_found("ticket", id))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
