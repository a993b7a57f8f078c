//! Change order engine.
//!
//! The engine is the only writer of change order status, `original_amount`,
//! `current_amount`, and ticket membership. Each operation runs as one
//! `BEGIN IMMEDIATE` transaction: the change order is re-read inside the
//! transaction, every rule is checked before the first write, and any error
//! drops the transaction, which rolls it back.
//!
//! # Invariants
//!
//! - `current_amount` equals the sum of `total_amount` over linked tickets
//!   after every committed operation.
//! - `original_amount` is zero while `draft` and is written exactly once, by
//!   [`ChangeOrderEngine::submit_change_order`], in the same statement that
//!   flips the status.
//! - Membership only changes while the change order is `draft`.
//! - The project reference never changes after creation.
//! - Every change order write is conditional on the `version` read in the
//!   same transaction and bumps it.

use crate::clock::{Clock, SystemClock};
use crate::db::query::{self, ChangeOrderFilter, decimal_text, to_micros};
use crate::error::{Result, TallyError};
use crate::model::{
    ChangeOrder, ChangeOrderId, ChangeOrderPatch, ChangeOrderStatus, ProjectId, Ticket, TicketId,
};
use crate::report::detail::{ChangeOrderDetail, change_order_detail};
use crate::store::require_project;
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of adding tickets to a change order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipChange {
    /// The change order with its recomputed `current_amount`.
    pub change_order: ChangeOrder,
    /// Every ticket now linked to the change order.
    pub tickets: Vec<Ticket>,
    /// Tickets newly linked by this call (already-linked ones are skipped).
    pub added: Vec<TicketId>,
}

/// Result of deleting a draft change order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedChangeOrder {
    pub id: ChangeOrderId,
    pub project_id: ProjectId,
    pub number: u32,
    /// Tickets whose link was cleared. The tickets themselves are kept.
    pub released: Vec<TicketId>,
}

/// Guards the change order state machine and ticket membership.
pub struct ChangeOrderEngine<'conn, C = SystemClock> {
    conn: &'conn Connection,
    clock: C,
}

impl<'conn> ChangeOrderEngine<'conn> {
    /// Create an engine that stamps rows with the system clock.
    #[must_use]
    pub const fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            clock: SystemClock,
        }
    }
}

impl<'conn, C: Clock> ChangeOrderEngine<'conn, C> {
    /// Create an engine with an explicit clock.
    pub const fn with_clock(conn: &'conn Connection, clock: C) -> Self {
        Self { conn, clock }
    }

    fn begin(&self) -> Result<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    // -----------------------------------------------------------------------
    // Creation and edits
    // -----------------------------------------------------------------------

    /// Open a new draft change order with zero amounts.
    ///
    /// # Errors
    ///
    /// `Validation` if the title is blank or the project is absent,
    /// `NotFound` if the project does not exist.
    pub fn create_change_order(
        &self,
        title: &str,
        project_id: Option<ProjectId>,
        notes: Option<&str>,
    ) -> Result<ChangeOrder> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TallyError::validation("change order title is required"));
        }
        let project_id =
            project_id.ok_or_else(|| TallyError::validation("change order project is required"))?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        let tx = self.begin()?;
        require_project(&*tx, project_id)?;

        let number = query::next_change_order_number(&tx, project_id)?;
        let now = to_micros(self.clock.now());
        tx.execute(
            "INSERT INTO change_orders (
                project_id, number, title, notes, status, original_amount, current_amount,
                version, created_at_us, updated_at_us
            ) VALUES (?1, ?2, ?3, ?4, 'draft', '0', '0', 0, ?5, ?5)",
            params![project_id.get(), number, title, notes, now],
        )?;
        let id = ChangeOrderId(tx.last_insert_rowid());
        let created = load(&tx, id)?;
        tx.commit()?;

        info!(co_id = %id, project_id = %project_id, number, "change order created");
        Ok(created)
    }

    /// Edit the title or notes of a draft change order.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty patch, a blank title, or an attempt to move
    /// the change order to another project. `InvalidState` unless draft.
    pub fn update_change_order(
        &self,
        id: ChangeOrderId,
        patch: &ChangeOrderPatch,
    ) -> Result<ChangeOrder> {
        if patch.is_empty() {
            return Err(TallyError::validation(format!("nothing to update on {id}")));
        }
        let tx = self.begin()?;
        let co = load(&tx, id)?;
        require_draft(&co, "edit")?;

        if let Some(project_id) = patch.project_id {
            if project_id != co.project_id {
                return Err(TallyError::validation(format!(
                    "change order {id} already belongs to project {}; its project cannot change",
                    co.project_id
                )));
            }
        }

        let title = match patch.title.as_deref().map(str::trim) {
            Some("") => return Err(TallyError::validation("change order title is required")),
            Some(title) => title.to_string(),
            None => co.title.clone(),
        };
        let notes = match &patch.notes {
            Some(notes) => notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            None => co.notes.clone(),
        };

        let changed = tx.execute(
            "UPDATE change_orders
             SET title = ?1, notes = ?2, version = version + 1, updated_at_us = ?3
             WHERE co_id = ?4 AND version = ?5",
            params![title, notes, to_micros(self.clock.now()), id.get(), co.version],
        )?;
        ensure_written(changed, &co)?;
        let updated = load(&tx, id)?;
        tx.commit()?;

        debug!(co_id = %id, "change order details updated");
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Link a batch of tickets to a draft change order.
    ///
    /// The batch is all-or-nothing: every ticket is checked before any link
    /// is written. Tickets already on this change order are left alone.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty batch or a ticket from another project,
    /// `NotFound` for an unknown change order or ticket, `InvalidState`
    /// unless draft, `Conflict` if a ticket is linked to another change order.
    pub fn add_tickets_to_change_order(
        &self,
        id: ChangeOrderId,
        ticket_ids: &[TicketId],
    ) -> Result<MembershipChange> {
        if ticket_ids.is_empty() {
            return Err(TallyError::validation("no tickets given to add"));
        }
        let mut seen = HashSet::new();
        let batch: Vec<TicketId> = ticket_ids
            .iter()
            .copied()
            .filter(|ticket_id| seen.insert(*ticket_id))
            .collect();

        let tx = self.begin()?;
        let co = load(&tx, id)?;
        require_draft(&co, "add tickets to")?;

        let mut to_link = Vec::with_capacity(batch.len());
        for ticket_id in batch {
            let ticket = query::get_ticket(&tx, ticket_id)?
                .ok_or_else(|| TallyError::not_found("ticket", ticket_id))?;
            match ticket.change_order_id {
                Some(current) if current == id => {
                    debug!(co_id = %id, ticket_id = %ticket_id, "ticket already linked");
                }
                Some(other) => {
                    warn!(
                        co_id = %id,
                        ticket_id = %ticket_id,
                        other = %other,
                        "ticket linked elsewhere"
                    );
                    return Err(TallyError::conflict(format!(
                        "ticket {ticket_id} is already on change order {other}"
                    )));
                }
                None if ticket.project_id != co.project_id => {
                    return Err(TallyError::validation(format!(
                        "ticket {ticket_id} belongs to project {}, not {}",
                        ticket.project_id, co.project_id
                    )));
                }
                None => to_link.push(ticket_id),
            }
        }

        let now = to_micros(self.clock.now());
        for ticket_id in &to_link {
            let linked = tx.execute(
                "UPDATE tickets SET co_id = ?1, updated_at_us = ?2
                 WHERE ticket_id = ?3 AND co_id IS NULL",
                params![id.get(), now, ticket_id.get()],
            )?;
            if linked != 1 {
                return Err(TallyError::conflict(format!(
                    "ticket {ticket_id} was linked by a concurrent writer"
                )));
            }
        }

        let updated = self.refresh_current_amount(&tx, &co)?;
        let tickets = query::tickets_for_change_order(&tx, id)?;
        tx.commit()?;

        info!(
            co_id = %id,
            added = to_link.len(),
            current_amount = %updated.current_amount,
            "tickets added to change order"
        );
        Ok(MembershipChange {
            change_order: updated,
            tickets,
            added: to_link,
        })
    }

    /// Unlink a ticket from a draft change order.
    ///
    /// Removing a ticket that is no longer linked anywhere is a no-op and
    /// returns the change order unchanged.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown change order or ticket, `InvalidState`
    /// unless draft, `Conflict` if the ticket is on a different change order.
    pub fn remove_ticket_from_change_order(
        &self,
        ticket_id: TicketId,
        id: ChangeOrderId,
    ) -> Result<ChangeOrder> {
        let tx = self.begin()?;
        let co = load(&tx, id)?;
        require_draft(&co, "remove tickets from")?;

        let ticket = query::get_ticket(&tx, ticket_id)?
            .ok_or_else(|| TallyError::not_found("ticket", ticket_id))?;

        match ticket.change_order_id {
            None => {
                debug!(co_id = %id, ticket_id = %ticket_id, "ticket already unlinked");
                return Ok(co);
            }
            Some(other) if other != id => {
                return Err(TallyError::conflict(format!(
                    "ticket {ticket_id} is on change order {other}, not {id}"
                )));
            }
            Some(_) => {}
        }

        tx.execute(
            "UPDATE tickets SET co_id = NULL, updated_at_us = ?1
             WHERE ticket_id = ?2 AND co_id = ?3",
            params![to_micros(self.clock.now()), ticket_id.get(), id.get()],
        )?;
        let updated = self.refresh_current_amount(&tx, &co)?;
        tx.commit()?;

        info!(
            co_id = %id,
            ticket_id = %ticket_id,
            current_amount = %updated.current_amount,
            "ticket removed from change order"
        );
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Status transitions
    // -----------------------------------------------------------------------

    /// Submit a draft change order, locking `original_amount`.
    ///
    /// `current_amount` is recomputed from the linked tickets inside the
    /// transaction and copied into `original_amount` in the same statement
    /// that sets `submitted`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown change order, `InvalidState` if it is not
    /// draft or has no linked tickets.
    pub fn submit_change_order(&self, id: ChangeOrderId) -> Result<ChangeOrder> {
        let tx = self.begin()?;
        let co = load(&tx, id)?;
        transition(&co, ChangeOrderStatus::Submitted)?;

        let (current, count) = query::linked_ticket_totals(&tx, id)?;
        if count == 0 {
            warn!(co_id = %id, "refused to submit empty change order");
            return Err(TallyError::invalid_state(format!(
                "change order {id} has no tickets; add at least one before submitting"
            )));
        }

        let now = to_micros(self.clock.now());
        let amount = decimal_text(current);
        let changed = tx.execute(
            "UPDATE change_orders
             SET status = 'submitted', current_amount = ?1, original_amount = ?1,
                 submitted_at_us = ?2, version = version + 1, updated_at_us = ?2
             WHERE co_id = ?3 AND version = ?4 AND status = 'draft'",
            params![amount, now, id.get(), co.version],
        )?;
        ensure_written(changed, &co)?;
        let submitted = load(&tx, id)?;
        tx.commit()?;

        info!(
            co_id = %id,
            tickets = count,
            original_amount = %submitted.original_amount,
            "change order submitted"
        );
        Ok(submitted)
    }

    /// Approve a submitted change order.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown change order, `InvalidState` unless
    /// submitted, `Validation` if `approver` is blank.
    pub fn approve_change_order(&self, id: ChangeOrderId, approver: &str) -> Result<ChangeOrder> {
        self.decide(id, ChangeOrderStatus::Approved, approver)
    }

    /// Reject a submitted change order. Rejection is terminal; rework goes
    /// into a new change order.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown change order, `InvalidState` unless
    /// submitted, `Validation` if `rejector` is blank.
    pub fn reject_change_order(&self, id: ChangeOrderId, rejector: &str) -> Result<ChangeOrder> {
        self.decide(id, ChangeOrderStatus::Rejected, rejector)
    }

    fn decide(
        &self,
        id: ChangeOrderId,
        target: ChangeOrderStatus,
        who: &str,
    ) -> Result<ChangeOrder> {
        let tx = self.begin()?;
        let co = load(&tx, id)?;
        transition(&co, target)?;

        let who = who.trim();
        if who.is_empty() {
            return Err(TallyError::validation(format!(
                "a name is required to mark change order {id} {target}"
            )));
        }

        let sql = match target {
            ChangeOrderStatus::Approved => {
                "UPDATE change_orders
                 SET status = 'approved', approved_by = ?1, approved_at_us = ?2,
                     version = version + 1, updated_at_us = ?2
                 WHERE co_id = ?3 AND version = ?4 AND status = 'submitted'"
            }
            _ => {
                "UPDATE change_orders
                 SET status = 'rejected', rejected_by = ?1, rejected_at_us = ?2,
                     version = version + 1, updated_at_us = ?2
                 WHERE co_id = ?3 AND version = ?4 AND status = 'submitted'"
            }
        };
        let changed = tx.execute(
            sql,
            params![who, to_micros(self.clock.now()), id.get(), co.version],
        )?;
        ensure_written(changed, &co)?;
        let decided = load(&tx, id)?;
        tx.commit()?;

        info!(co_id = %id, status = %target, by = who, "change order decided");
        Ok(decided)
    }

    /// Delete a draft change order, releasing its tickets.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown change order, `InvalidState` unless draft.
    pub fn delete_change_order(&self, id: ChangeOrderId) -> Result<DeletedChangeOrder> {
        let tx = self.begin()?;
        let co = load(&tx, id)?;
        require_draft(&co, "delete")?;

        let released: Vec<TicketId> = query::tickets_for_change_order(&tx, id)?
            .into_iter()
            .map(|t| t.id)
            .collect();
        tx.execute(
            "UPDATE tickets SET co_id = NULL, updated_at_us = ?1 WHERE co_id = ?2",
            params![to_micros(self.clock.now()), id.get()],
        )?;
        let deleted = tx.execute(
            "DELETE FROM change_orders WHERE co_id = ?1 AND version = ?2 AND status = 'draft'",
            params![id.get(), co.version],
        )?;
        ensure_written(deleted, &co)?;
        tx.commit()?;

        info!(co_id = %id, released = released.len(), "change order deleted");
        Ok(DeletedChangeOrder {
            id,
            project_id: co.project_id,
            number: co.number,
            released,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch a change order.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub fn get_change_order(&self, id: ChangeOrderId) -> Result<ChangeOrder> {
        load(self.conn, id)
    }

    /// List change orders matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub fn list_change_orders(&self, filter: &ChangeOrderFilter) -> Result<Vec<ChangeOrder>> {
        query::list_change_orders(self.conn, filter)
    }

    /// A change order with its tickets, project, and variance resolved.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub fn change_order_detail(&self, id: ChangeOrderId) -> Result<ChangeOrderDetail> {
        change_order_detail(self.conn, id)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Recompute `current_amount` from linked tickets and persist it.
    fn refresh_current_amount(&self, tx: &Connection, co: &ChangeOrder) -> Result<ChangeOrder> {
        let (current, count) = query::linked_ticket_totals(tx, co.id)?;
        let changed = tx.execute(
            "UPDATE change_orders
             SET current_amount = ?1, version = version + 1, updated_at_us = ?2
             WHERE co_id = ?3 AND version = ?4",
            params![decimal_text(current), to_micros(self.clock.now()), co.id.get(), co.version],
        )?;
        ensure_written(changed, co)?;
        debug!(
            co_id = %co.id,
            tickets = count,
            current_amount = %current,
            "recomputed current amount"
        );
        load(tx, co.id)
    }
}

fn load(conn: &Connection, id: ChangeOrderId) -> Result<ChangeOrder> {
    query::get_change_order(conn, id)?.ok_or_else(|| TallyError::not_found("change order", id))
}

fn require_draft(co: &ChangeOrder, action: &str) -> Result<()> {
    if co.is_editable() {
        return Ok(());
    }
    warn!(co_id = %co.id, status = %co.status, action, "refused change to non-draft change order");
    Err(TallyError::invalid_state(format!(
        "cannot {action} change order {} while it is {}; only draft change orders can change",
        co.id, co.status
    )))
}

fn transition(co: &ChangeOrder, target: ChangeOrderStatus) -> Result<()> {
    co.status.can_transition_to(target).map_err(|e| {
        warn!(co_id = %co.id, from = %e.from, to = %e.to, "refused change order transition");
        TallyError::invalid_state(format!("change order {}: {e}", co.id))
    })
}

fn ensure_written(changed: usize, co: &ChangeOrder) -> Result<()> {
    if changed == 1 {
        Ok(())
    } else {
        Err(TallyError::conflict(format!(
            "change order {} was modified concurrently (expected version {})",
            co.id, co.version
        )))
    }
}
