//! `SQLite` query helpers.
//!
//! Typed decoders and composable read queries shared by the ticket store,
//! the change order engine, and the reconciliation reports. Every function
//! takes a shared `&Connection`, so the same helpers run inside an engine
//! transaction (via deref) or against a plain read connection.

use crate::error::{Result, TallyError};
use crate::model::{
    ChangeOrder, ChangeOrderId, ChangeOrderStatus, Project, ProjectId, Ticket, TicketId,
    TicketStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter, types::Type};
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// Decode a decimal text column.
pub(crate) fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Decode a microsecond timestamp column.
pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let us: i64 = row.get(idx)?;
    from_micros(us).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, us))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let us: Option<i64> = row.get(idx)?;
    us.map(|us| from_micros(us).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, us)))
        .transpose()
}

fn parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Convert a timestamp to stored microseconds.
#[must_use]
pub fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

/// Convert stored microseconds to a timestamp.
#[must_use]
pub fn from_micros(us: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us)
}

/// Storage form of a decimal amount.
#[must_use]
pub fn decimal_text(amount: Decimal) -> String {
    amount.normalize().to_string()
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

const PROJECT_COLUMNS: &str = "project_id, code, name, budget, is_active, created_at_us";

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId(row.get(0)?),
        code: row.get(1)?,
        name: row.get(2)?,
        budget: decimal_at(row, 3)?,
        is_active: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
    })
}

/// Fetch a project by id.
///
/// # Errors
///
/// Returns an error if the query fails or a column fails to decode.
pub fn get_project(conn: &Connection, id: ProjectId) -> Result<Option<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1");
    Ok(conn
        .query_row(&sql, params![id.get()], row_to_project)
        .optional()?)
}

/// Fetch a project by its code (case-insensitive).
///
/// # Errors
///
/// Returns an error if the query fails or a column fails to decode.
pub fn get_project_by_code(conn: &Connection, code: &str) -> Result<Option<Project>> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE code = ?1 COLLATE NOCASE"
    );
    Ok(conn
        .query_row(&sql, params![code.trim()], row_to_project)
        .optional()?)
}

/// List projects ordered by code.
///
/// # Errors
///
/// Returns an error if the query fails or a row fails to decode.
pub fn list_projects(conn: &Connection, active_only: bool) -> Result<Vec<Project>> {
    let filter = if active_only { " WHERE is_active = 1" } else { "" };
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects{filter} ORDER BY code ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_project)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

const TICKET_COLUMNS: &str = "t.ticket_id, t.project_id, t.status, t.work_date, t.description, \
     t.location, t.cost_code, t.labor_total, t.materials_total, t.total_amount, t.co_id, \
     t.created_at_us, t.updated_at_us";

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let work_date: Option<String> = row.get(3)?;
    let work_date = work_date
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| conversion_error(3, Type::Text, e))
        })
        .transpose()?;

    Ok(Ticket {
        id: TicketId(row.get(0)?),
        project_id: ProjectId(row.get(1)?),
        status: parsed_at::<TicketStatus>(row, 2)?,
        work_date,
        description: row.get(4)?,
        location: row.get(5)?,
        cost_code: row.get(6)?,
        labor_total: decimal_at(row, 7)?,
        materials_total: decimal_at(row, 8)?,
        total_amount: decimal_at(row, 9)?,
        change_order_id: row.get::<_, Option<i64>>(10)?.map(ChangeOrderId),
        created_at: timestamp_at(row, 11)?,
        updated_at: timestamp_at(row, 12)?,
    })
}

/// Which change order link a ticket listing should match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assignment {
    /// Any ticket, linked or not.
    #[default]
    Any,
    /// Only tickets with no change order.
    Unassigned,
    /// Only tickets linked to any change order.
    Assigned,
    /// Only tickets linked to this change order.
    To(ChangeOrderId),
}

/// Filter criteria for ticket listings, combined with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<TicketStatus>,
    pub assignment: Assignment,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Fetch a single ticket.
///
/// # Errors
///
/// Returns an error if the query fails or a column fails to decode.
pub fn get_ticket(conn: &Connection, id: TicketId) -> Result<Option<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets t WHERE t.ticket_id = ?1");
    Ok(conn
        .query_row(&sql, params![id.get()], row_to_ticket)
        .optional()?)
}

/// List tickets matching `filter`, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a row fails to decode.
pub fn list_tickets(conn: &Connection, filter: &TicketFilter) -> Result<Vec<Ticket>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(project_id) = filter.project_id {
        param_values.push(Box::new(project_id.get()));
        conditions.push(format!("t.project_id = ?{}", param_values.len()));
    }

    if let Some(status) = filter.status {
        param_values.push(Box::new(status.as_str()));
        conditions.push(format!("t.status = ?{}", param_values.len()));
    }

    match filter.assignment {
        Assignment::Any => {}
        Assignment::Unassigned => conditions.push("t.co_id IS NULL".to_string()),
        Assignment::Assigned => conditions.push("t.co_id IS NOT NULL".to_string()),
        Assignment::To(co_id) => {
            param_values.push(Box::new(co_id.get()));
            conditions.push(format!("t.co_id = ?{}", param_values.len()));
        }
    }

    let mut sql = format!("SELECT {TICKET_COLUMNS} FROM tickets t");
    if !conditions.is_empty() {
        let _ = write!(sql, " WHERE {}", conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY t.created_at_us ASC, t.ticket_id ASC");
    match (filter.limit, filter.offset) {
        (Some(limit), Some(offset)) => {
            let _ = write!(sql, " LIMIT {limit} OFFSET {offset}");
        }
        (Some(limit), None) => {
            let _ = write!(sql, " LIMIT {limit}");
        }
        (None, Some(offset)) => {
            let _ = write!(sql, " LIMIT -1 OFFSET {offset}");
        }
        (None, None) => {}
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(params_from_iter(params_ref), row_to_ticket)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// All tickets currently linked to `co_id`.
///
/// # Errors
///
/// Returns an error if the query fails or a row fails to decode.
pub fn tickets_for_change_order(conn: &Connection, co_id: ChangeOrderId) -> Result<Vec<Ticket>> {
    list_tickets(
        conn,
        &TicketFilter {
            assignment: Assignment::To(co_id),
            ..TicketFilter::default()
        },
    )
}

/// Sum of `total_amount` over tickets linked to `co_id`, plus their count.
///
/// Summed in Rust because amounts are stored as decimal text.
///
/// # Errors
///
/// Returns an error if the query fails, an amount fails to decode, or the
/// sum leaves `Decimal`'s range.
pub fn linked_ticket_totals(conn: &Connection, co_id: ChangeOrderId) -> Result<(Decimal, usize)> {
    let mut stmt = conn.prepare("SELECT total_amount FROM tickets WHERE co_id = ?1")?;
    let rows = stmt.query_map(params![co_id.get()], |row| decimal_at(row, 0))?;

    let mut sum = Decimal::ZERO;
    let mut count = 0;
    for amount in rows {
        sum = sum.checked_add(amount?).ok_or_else(|| {
            TallyError::validation(format!("ticket totals on {co_id} exceed the supported range"))
        })?;
        count += 1;
    }
    Ok((sum, count))
}

// ---------------------------------------------------------------------------
// Change orders
// ---------------------------------------------------------------------------

const CHANGE_ORDER_COLUMNS: &str = "co_id, project_id, number, title, notes, status, \
     original_amount, current_amount, submitted_at_us, approved_at_us, approved_by, \
     rejected_at_us, rejected_by, version, created_at_us, updated_at_us";

fn row_to_change_order(row: &Row<'_>) -> rusqlite::Result<ChangeOrder> {
    let number: i64 = row.get(2)?;
    Ok(ChangeOrder {
        id: ChangeOrderId(row.get(0)?),
        project_id: ProjectId(row.get(1)?),
        number: u32::try_from(number).map_err(|e| conversion_error(2, Type::Integer, e))?,
        title: row.get(3)?,
        notes: row.get(4)?,
        status: parsed_at::<ChangeOrderStatus>(row, 5)?,
        original_amount: decimal_at(row, 6)?,
        current_amount: decimal_at(row, 7)?,
        submitted_at: optional_timestamp_at(row, 8)?,
        approved_at: optional_timestamp_at(row, 9)?,
        approved_by: row.get(10)?,
        rejected_at: optional_timestamp_at(row, 11)?,
        rejected_by: row.get(12)?,
        version: row.get(13)?,
        created_at: timestamp_at(row, 14)?,
        updated_at: timestamp_at(row, 15)?,
    })
}

/// Filter criteria for change order listings.
#[derive(Debug, Clone, Default)]
pub struct ChangeOrderFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<ChangeOrderStatus>,
}

/// Fetch a single change order.
///
/// # Errors
///
/// Returns an error if the query fails or a column fails to decode.
pub fn get_change_order(conn: &Connection, id: ChangeOrderId) -> Result<Option<ChangeOrder>> {
    let sql = format!("SELECT {CHANGE_ORDER_COLUMNS} FROM change_orders WHERE co_id = ?1");
    Ok(conn
        .query_row(&sql, params![id.get()], row_to_change_order)
        .optional()?)
}

/// List change orders matching `filter`, by project then sequence number.
///
/// # Errors
///
/// Returns an error if the query fails or a row fails to decode.
pub fn list_change_orders(
    conn: &Connection,
    filter: &ChangeOrderFilter,
) -> Result<Vec<ChangeOrder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANGE_ORDER_COLUMNS} FROM change_orders \
         WHERE (?1 IS NULL OR project_id = ?1) AND (?2 IS NULL OR status = ?2) \
         ORDER BY project_id ASC, number ASC"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.project_id.map(ProjectId::get),
            filter.status.map(ChangeOrderStatus::as_str)
        ],
        row_to_change_order,
    )?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Next per-project change order sequence number.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn next_change_order_number(conn: &Connection, project_id: ProjectId) -> Result<u32> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(number), 0) FROM change_orders WHERE project_id = ?1",
        params![project_id.get()],
        |row| row.get(0),
    )?;
    let max = u32::try_from(max)
        .map_err(|e| conversion_error(0, Type::Integer, e))?;
    Ok(max + 1)
}

#[cfg(test)]
mod tests {
    use super::{decimal_text, from_micros, to_micros};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    #[test]
    fn micros_roundtrip() {
        let at = Utc.with_ymd_and_hms(2026, 5, 4, 7, 30, 15).unwrap();
        assert_eq!(from_micros(to_micros(at)), Some(at));
    }

    #[test]
    fn decimal_text_drops_trailing_zeros() {
        assert_eq!(decimal_text(Decimal::new(120_000, 2)), "1200");
        assert_eq!(decimal_text(Decimal::new(12_050, 2)), "120.5");
    }
}
