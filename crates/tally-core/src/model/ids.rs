//! Typed row identifiers.
//!
//! Ids render with a short prefix (`t-12`, `co-4`, `p-1`) and parse from
//! either the prefixed form or the bare number.

use serde::{Deserialize, Serialize};
use std::{fmt, num::ParseIntError, str::FromStr};

/// Error returned when an id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    pub kind: &'static str,
    pub got: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} id: '{}'", self.kind, self.got)
    }
}

impl std::error::Error for ParseIdError {}

fn parse_prefixed(raw: &str, prefix: &str, kind: &'static str) -> Result<i64, ParseIdError> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let digits = lowered
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .unwrap_or(&lowered);

    digits
        .parse::<i64>()
        .map_err(|_: ParseIntError| ParseIdError {
            kind,
            got: trimmed.to_string(),
        })
        .and_then(|value| {
            if value > 0 {
                Ok(value)
            } else {
                Err(ParseIdError {
                    kind,
                    got: trimmed.to_string(),
                })
            }
        })
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw SQLite rowid.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_prefixed(s, $prefix, $kind).map(Self)
            }
        }
    };
}

row_id!(
    /// Identifier of a T&M ticket.
    TicketId,
    "t",
    "ticket"
);
row_id!(
    /// Identifier of a change order.
    ChangeOrderId,
    "co",
    "change order"
);
row_id!(
    /// Identifier of a project.
    ProjectId,
    "p",
    "project"
);
