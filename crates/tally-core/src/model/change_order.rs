use super::{ChangeOrderId, InvalidTransition, ParseEnumError, ProjectId, normalize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four change order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrderStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ChangeOrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Submitted, Self::Approved, Self::Rejected];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `draft -> submitted`
    /// - `submitted -> approved`
    /// - `submitted -> rejected`
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for every other pair.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition<Self>> {
        if self == target {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        if self.is_terminal() {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "change order is already decided",
            });
        }

        let allowed = matches!(
            (self, target),
            (Self::Draft, Self::Submitted) | (Self::Submitted, Self::Approved | Self::Rejected)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
                reason: "change orders must be submitted before a decision",
            })
        }
    }
}

impl fmt::Display for ChangeOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeOrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError {
                expected: "change order status",
                got: s.to_string(),
            }),
        }
    }
}

/// A stored change order.
///
/// `current_amount` mirrors the sum of linked ticket totals and is only
/// written by the engine. `original_amount` stays zero until submission,
/// then holds the amount locked at that instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOrder {
    pub id: ChangeOrderId,
    pub project_id: ProjectId,
    pub number: u32,
    pub title: String,
    pub notes: Option<String>,
    pub status: ChangeOrderStatus,
    pub original_amount: Decimal,
    pub current_amount: Decimal,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChangeOrder {
    /// Human-facing sequence label, e.g. `CO-003`.
    #[must_use]
    pub fn display_number(&self) -> String {
        format!("CO-{:03}", self.number)
    }

    /// True while tickets may still be added or removed.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.status == ChangeOrderStatus::Draft
    }
}

/// Editable change order fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeOrderPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
    pub project_id: Option<ProjectId>,
}

impl ChangeOrderPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_none() && self.project_id.is_none()
    }
}
