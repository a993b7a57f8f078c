use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ValidationFailed,
    RecordNotFound,
    InvalidStateTransition,
    MembershipConflict,
    InvalidEnumValue,
    CorruptRecord,
    StorageFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ValidationFailed => "E2001",
            Self::RecordNotFound => "E2002",
            Self::InvalidStateTransition => "E2003",
            Self::MembershipConflict => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::CorruptRecord => "E3001",
            Self::StorageFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ValidationFailed => "Validation failed",
            Self::RecordNotFound => "Record not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::MembershipConflict => "Ticket membership conflict",
            Self::InvalidEnumValue => "Invalid status value",
            Self::CorruptRecord => "Corrupt stored record",
            Self::StorageFailure => "Storage failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tally init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::ValidationFailed => Some("Supply the missing or malformed field and retry."),
            Self::RecordNotFound => Some("Check the id with `tally ticket list` or `tally co list`."),
            Self::InvalidStateTransition => Some(
                "Change orders move draft -> submitted -> approved|rejected; only drafts accept ticket changes.",
            ),
            Self::MembershipConflict => {
                Some("Remove the ticket from its current change order first.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented status values."),
            Self::CorruptRecord => Some("Inspect .tally/tally.sqlite3; a stored value failed to decode."),
            Self::StorageFailure => Some("Retry after other `tally` processes finish writing."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the ticket store, change order engine, and reports.
///
/// Every variant except [`TallyError::Storage`] is raised before any write
/// is committed, so a failed operation leaves stored state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The record's current status does not permit the operation.
    #[error("{0}")]
    InvalidState(String),

    /// A ticket is already linked elsewhere, or a concurrent writer won.
    #[error("{0}")]
    Conflict(String),

    /// A referenced record does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The backing store failed; surfaced as-is, never retried.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl TallyError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::InvalidState(_) => ErrorCode::InvalidStateTransition,
            Self::Conflict(_) => ErrorCode::MembershipConflict,
            Self::NotFound { .. } => ErrorCode::RecordNotFound,
            Self::Storage(rusqlite::Error::FromSqlConversionFailure(..)) => {
                ErrorCode::CorruptRecord
            }
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Snake-case error kind used in JSON output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::Storage(_) => "storage",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Result alias used across the core crate.
pub type Result<T, E = TallyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, TallyError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::ValidationFailed,
            ErrorCode::RecordNotFound,
            ErrorCode::InvalidStateTransition,
            ErrorCode::MembershipConflict,
            ErrorCode::InvalidEnumValue,
            ErrorCode::CorruptRecord,
            ErrorCode::StorageFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidStateTransition.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn variants_map_to_codes() {
        assert_eq!(
            TallyError::validation("title is required").code(),
            ErrorCode::ValidationFailed
        );
        assert_eq!(
            TallyError::conflict("t-1 is on co-2").code(),
            ErrorCode::MembershipConflict
        );
        let missing = TallyError::not_found("change order", "co-9");
        assert_eq!(missing.code(), ErrorCode::RecordNotFound);
        assert_eq!(missing.to_string(), "change order 'co-9' not found");
        assert_eq!(missing.kind(), "not_found");
    }
}
