use super::money::MAX_TICKET_AMOUNT;
use super::{ChangeOrderId, InvalidTransition, ParseEnumError, ProjectId, TicketId, normalize};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Ticket lifecycle status, independent of any change order status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Draft,
    #[default]
    PendingReview,
    Approved,
    Rejected,
    Billed,
    Paid,
}

impl TicketStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::PendingReview,
        Self::Approved,
        Self::Rejected,
        Self::Billed,
        Self::Paid,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Billed => "billed",
            Self::Paid => "paid",
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `draft -> pending_review`
    /// - `pending_review -> approved | rejected | draft`
    /// - `rejected -> draft | pending_review` (rework)
    /// - `approved -> billed`
    /// - `billed -> paid`
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for no-op or disallowed moves.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition<Self>> {
        if self == target {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        let allowed = matches!(
            (self, target),
            (Self::Draft, Self::PendingReview)
                | (
                    Self::PendingReview,
                    Self::Approved | Self::Rejected | Self::Draft
                )
                | (Self::Rejected, Self::Draft | Self::PendingReview)
                | (Self::Approved, Self::Billed)
                | (Self::Billed, Self::Paid)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
                reason: "transition not allowed by ticket lifecycle",
            })
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    /// Parses the canonical names plus the capture workflow's `pending`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "draft" => Ok(Self::Draft),
            "pending_review" | "pending" | "review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "billed" => Ok(Self::Billed),
            "paid" => Ok(Self::Paid),
            _ => Err(ParseEnumError {
                expected: "ticket status",
                got: s.to_string(),
            }),
        }
    }
}

/// A stored T&M ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub project_id: ProjectId,
    pub status: TicketStatus,
    pub work_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cost_code: Option<String>,
    pub labor_total: Decimal,
    pub materials_total: Decimal,
    pub total_amount: Decimal,
    pub change_order_id: Option<ChangeOrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Whole days since creation, floored and clamped at zero.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        whole_days_between(self.created_at, now)
    }

    /// True when the ticket is not linked to any change order.
    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        self.change_order_id.is_none()
    }
}

/// Whole elapsed days from `since` to `now`, never negative.
#[must_use]
pub fn whole_days_between(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_seconds().max(0) / 86_400
}

/// Input for creating a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTicket {
    pub project_id: Option<ProjectId>,
    pub status: TicketStatus,
    pub work_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cost_code: Option<String>,
    pub labor_total: Decimal,
    pub materials_total: Decimal,
}

impl NewTicket {
    /// `labor_total + materials_total`, or `None` if the sum overflows.
    #[must_use]
    pub fn total_amount(&self) -> Option<Decimal> {
        self.labor_total.checked_add(self.materials_total)
    }

    /// Check field-level rules that do not need the store.
    ///
    /// Each amount must lie in `0..=MAX_TICKET_AMOUNT`, and so must their sum.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first offending field.
    pub fn validate(&self) -> Result<ProjectId, String> {
        let project_id = self
            .project_id
            .ok_or_else(|| "ticket project is required".to_string())?;
        for (field, amount) in [
            ("labor total", self.labor_total),
            ("materials total", self.materials_total),
        ] {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(format!("{field} must not be negative (got {amount})"));
            }
            if amount > MAX_TICKET_AMOUNT {
                return Err(format!("{field} exceeds {MAX_TICKET_AMOUNT} (got {amount})"));
            }
        }
        match self.total_amount() {
            Some(total) if total <= MAX_TICKET_AMOUNT => Ok(project_id),
            _ => Err(format!("ticket total exceeds {MAX_TICKET_AMOUNT}")),
        }
    }
}
