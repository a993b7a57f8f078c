use crate::model::ChangeOrder;
use crate::model::money::percent_of;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Drift of a change order's live amount from the amount locked at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variance {
    /// `current_amount - original_amount`.
    pub amount: Decimal,
    /// Percent of `original_amount`, one decimal place. `None` while there
    /// is no locked baseline.
    pub percent: Option<Decimal>,
    pub is_over_budget: bool,
}

impl Variance {
    /// Percent rendered for people, `—` when undefined.
    #[must_use]
    pub fn percent_label(&self) -> String {
        self.percent
            .map_or_else(|| "\u{2014}".to_string(), |p| format!("{p:.1}%"))
    }
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.amount, self.percent_label())
    }
}

/// Variance between a change order's current and original amounts.
///
/// A draft has `original_amount == 0`, so its percent is undefined rather
/// than reported as a misleading 0%.
#[must_use]
pub fn calculate_variance(co: &ChangeOrder) -> Variance {
    let amount = co.current_amount - co.original_amount;
    Variance {
        amount,
        percent: percent_of(amount, co.original_amount, 1),
        is_over_budget: amount > Decimal::ZERO,
    }
}
