//! Domain types: tickets, change orders, projects, and their identifiers.

pub mod change_order;
pub mod ids;
pub mod money;
pub mod project;
pub mod ticket;

pub use change_order::{ChangeOrder, ChangeOrderPatch, ChangeOrderStatus};
pub use ids::{ChangeOrderId, ProjectId, TicketId};
pub use project::{NewProject, Project};
pub use ticket::{NewTicket, Ticket, TicketStatus};

use std::fmt;

/// Error returned when a status transition is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition<S> {
    pub from: S,
    pub to: S,
    pub reason: &'static str,
}

impl<S: fmt::Display> fmt::Display for InvalidTransition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move from {} to {}: {}", self.from, self.to, self.reason)
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

pub(crate) fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('-', "_")
}
