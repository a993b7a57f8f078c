//! Capture boundary: turn best-effort extractor JSON into a validated ticket.
//!
//! The transcript extractor returns loosely shaped JSON. Any field may be
//! null or missing, `labor` and `materials` may be a list or a single
//! object, and numbers may arrive as strings such as `"$1,200.50"`. This
//! module accepts all of that, normalizes it into a fixed [`TicketDraft`],
//! and prices the draft into a [`NewTicket`] that goes through the same
//! validation as hand-entered data.

use crate::error::{Result, TallyError};
use crate::model::money::parse_amount;
use crate::model::{NewTicket, ProjectId, TicketStatus};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A value the extractor may send as one item or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

/// A number that may arrive as JSON number or text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    /// The value as a decimal, or `None` if it is not a number.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(n) => Some(Decimal::from(*n)),
            Self::Float(f) => Decimal::try_from(*f).ok(),
            Self::Text(s) => parse_amount(s),
        }
    }
}

/// Raw extractor output for one ticket.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedTicket {
    #[serde(alias = "work_date")]
    pub date: Option<String>,
    pub labor: Option<OneOrMany<ExtractedLabor>>,
    #[serde(alias = "material")]
    pub materials: Option<OneOrMany<ExtractedMaterial>>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "cost_code")]
    pub cost_code_suggestion: Option<String>,
}

/// Raw labor entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedLabor {
    #[serde(alias = "trade", alias = "role", alias = "type")]
    pub classification: Option<String>,
    #[serde(alias = "count", alias = "crew_size", alias = "headcount")]
    pub workers: Option<LooseNumber>,
    pub hours: Option<LooseNumber>,
    #[serde(alias = "hourly_rate")]
    pub rate: Option<LooseNumber>,
}

/// Raw material entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractedMaterial {
    #[serde(alias = "item", alias = "name")]
    pub description: Option<String>,
    #[serde(alias = "qty")]
    pub quantity: Option<LooseNumber>,
    pub unit: Option<String>,
    #[serde(alias = "unit_price", alias = "price")]
    pub unit_cost: Option<LooseNumber>,
}

/// One priced labor line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaborLine {
    pub classification: String,
    pub workers: Decimal,
    pub hours: Decimal,
    /// Hourly rate per worker. `None` falls back to the configured default.
    pub rate: Option<Decimal>,
}

/// One material line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_cost: Option<Decimal>,
}

/// Fixed-shape ticket draft produced from extractor output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketDraft {
    pub work_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cost_code: Option<String>,
    pub labor: Vec<LaborLine>,
    pub materials: Vec<MaterialLine>,
    /// Fields that were present but could not be understood.
    pub warnings: Vec<String>,
}

/// Parse extractor output holding one ticket or a list of tickets.
///
/// # Errors
///
/// `Validation` if the text is not JSON of a recognizable shape.
pub fn parse_extraction(json: &str) -> Result<Vec<ExtractedTicket>> {
    let parsed: OneOrMany<ExtractedTicket> = serde_json::from_str(json)
        .map_err(|e| TallyError::validation(format!("unreadable extractor output: {e}")))?;
    Ok(parsed.into_vec())
}

impl ExtractedTicket {
    /// Normalize into a [`TicketDraft`], dropping empty lines and recording
    /// anything unparseable as a warning.
    #[must_use]
    pub fn normalize(self) -> TicketDraft {
        let mut warnings = Vec::new();

        let work_date = text(self.date).and_then(|raw| {
            let parsed = parse_work_date(&raw);
            if parsed.is_none() {
                warnings.push(format!("ignored unrecognized date '{raw}'"));
            }
            parsed
        });

        let labor = self
            .labor
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let mut field = |value: Option<&LooseNumber>, name: &str| {
                    number(value, &format!("labor[{i}].{name}"), &mut warnings)
                };
                let workers = field(raw.workers.as_ref(), "workers");
                let hours = field(raw.hours.as_ref(), "hours");
                let rate = field(raw.rate.as_ref(), "rate");
                let classification = text(raw.classification);
                if classification.is_none() && hours.is_none() && workers.is_none() {
                    return None;
                }
                Some(LaborLine {
                    classification: classification.unwrap_or_else(|| "Labor".to_string()),
                    workers: workers.unwrap_or(Decimal::ONE),
                    hours: hours.unwrap_or(Decimal::ZERO),
                    rate,
                })
            })
            .collect();

        let materials = self
            .materials
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let mut field = |value: Option<&LooseNumber>, name: &str| {
                    number(value, &format!("materials[{i}].{name}"), &mut warnings)
                };
                let quantity = field(raw.quantity.as_ref(), "quantity");
                let unit_cost = field(raw.unit_cost.as_ref(), "unit_cost");
                let description = text(raw.description)?;
                Some(MaterialLine {
                    description,
                    quantity: quantity.unwrap_or(Decimal::ONE),
                    unit: text(raw.unit),
                    unit_cost,
                })
            })
            .collect();

        TicketDraft {
            work_date,
            description: text(self.description),
            location: text(self.location),
            cost_code: text(self.cost_code_suggestion),
            labor,
            materials,
            warnings,
        }
    }
}

impl TicketDraft {
    /// Price the draft and build a ticket for `project_id`.
    ///
    /// Labor lines without a rate use `default_labor_rate`. Materials
    /// without a unit cost are priced at zero.
    ///
    /// # Errors
    ///
    /// `Validation` when a labor line has no usable rate, a quantity or rate
    /// is negative, an amount is past `MAX_TICKET_AMOUNT`, or the draft has
    /// no labor and no materials.
    pub fn price(
        &self,
        project_id: ProjectId,
        default_labor_rate: Option<Decimal>,
    ) -> Result<NewTicket> {
        if self.labor.is_empty() && self.materials.is_empty() {
            return Err(TallyError::validation(
                "captured ticket has no labor or material lines",
            ));
        }

        let mut labor_total = Decimal::ZERO;
        for line in &self.labor {
            let rate = line.rate.or(default_labor_rate).ok_or_else(|| {
                TallyError::validation(format!(
                    "labor line '{}' has no rate and no default_labor_rate is configured",
                    line.classification
                ))
            })?;
            let checked = [("workers", line.workers), ("hours", line.hours), ("rate", rate)];
            for (field, value) in checked {
                if value.is_sign_negative() && !value.is_zero() {
                    return Err(TallyError::validation(format!(
                        "labor line '{}' has negative {field} ({value})",
                        line.classification
                    )));
                }
            }
            let amount = line
                .workers
                .checked_mul(line.hours)
                .and_then(|v| v.checked_mul(rate))
                .ok_or_else(|| out_of_range(&format!("labor line '{}'", line.classification)))?;
            labor_total = labor_total
                .checked_add(cents(amount))
                .ok_or_else(|| out_of_range("labor total"))?;
        }

        let mut materials_total = Decimal::ZERO;
        for line in &self.materials {
            let unit_cost = line.unit_cost.unwrap_or(Decimal::ZERO);
            if (line.quantity.is_sign_negative() && !line.quantity.is_zero())
                || (unit_cost.is_sign_negative() && !unit_cost.is_zero())
            {
                return Err(TallyError::validation(format!(
                    "material '{}' has a negative quantity or cost",
                    line.description
                )));
            }
            let amount = line
                .quantity
                .checked_mul(unit_cost)
                .ok_or_else(|| out_of_range(&format!("material '{}'", line.description)))?;
            materials_total = materials_total
                .checked_add(cents(amount))
                .ok_or_else(|| out_of_range("materials total"))?;
        }

        debug!(
            project_id = %project_id,
            labor_lines = self.labor.len(),
            material_lines = self.materials.len(),
            labor_total = %labor_total,
            materials_total = %materials_total,
            "priced captured ticket"
        );

        let ticket = NewTicket {
            project_id: Some(project_id),
            status: TicketStatus::PendingReview,
            work_date: self.work_date,
            description: self.description.clone(),
            location: self.location.clone(),
            cost_code: self.cost_code.clone(),
            labor_total,
            materials_total,
        };
        ticket.validate().map_err(TallyError::Validation)?;
        Ok(ticket)
    }
}

fn out_of_range(what: &str) -> TallyError {
    TallyError::validation(format!("{what} is too large to price"))
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn number(value: Option<&LooseNumber>, field: &str, warnings: &mut Vec<String>) -> Option<Decimal> {
    let value = value?;
    if matches!(value, LooseNumber::Text(s) if s.trim().is_empty()) {
        return None;
    }
    let parsed = value.to_decimal();
    if parsed.is_none() {
        warnings.push(format!("ignored non-numeric {field}"));
    }
    parsed
}

fn parse_work_date(raw: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
