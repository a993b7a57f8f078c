use super::ProjectId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A job the tickets and change orders are billed against.
///
/// Projects are owned elsewhere; the engine only reads them to validate
/// references and to label report groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub code: String,
    pub name: String,
    pub budget: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub budget: Decimal,
}
