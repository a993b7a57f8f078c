use super::variance::{Variance, calculate_variance};
use crate::db::query;
use crate::error::{Result, TallyError};
use crate::model::{ChangeOrder, ChangeOrderId, Project, Ticket};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

/// A change order with everything an exporter needs resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOrderDetail {
    pub change_order: ChangeOrder,
    pub project: Option<Project>,
    pub tickets: Vec<Ticket>,
    pub variance: Variance,
}

/// Load a change order with its project, linked tickets, and variance from
/// one read snapshot.
///
/// # Errors
///
/// `NotFound` if the change order does not exist.
pub fn change_order_detail(conn: &Connection, id: ChangeOrderId) -> Result<ChangeOrderDetail> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let change_order = query::get_change_order(&tx, id)?
        .ok_or_else(|| TallyError::not_found("change order", id))?;
    let project = query::get_project(&tx, change_order.project_id)?;
    let tickets = query::tickets_for_change_order(&tx, id)?;
    tx.commit()?;

    let variance = calculate_variance(&change_order);
    Ok(ChangeOrderDetail {
        change_order,
        project,
        tickets,
        variance,
    })
}
