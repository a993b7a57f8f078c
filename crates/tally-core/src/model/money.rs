//! Decimal money helpers.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Largest labor, materials, or total amount a single ticket may carry
/// (one trillion).
///
/// Change order and report sums add bounded ticket totals, so they stay
/// far inside `Decimal`'s range.
pub const MAX_TICKET_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Parse a money amount typed by a person or emitted by the extractor.
///
/// Accepts `1200`, `1,200.50`, `$1,200.50`, and surrounding whitespace.
/// Returns `None` for anything else, including an empty string.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// `part / whole * 100`, rounded half away from zero to `dp` places.
///
/// Returns `None` when `whole` is not positive or the ratio does not fit
/// in a `Decimal`.
#[must_use]
pub fn percent_of(part: Decimal, whole: Decimal, dp: u32) -> Option<Decimal> {
    if whole <= Decimal::ZERO {
        return None;
    }
    let raw = part.checked_div(whole)?.checked_mul(Decimal::ONE_HUNDRED)?;
    Some(raw.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
}

/// Render an amount with a currency symbol and two decimal places.
#[must_use]
pub fn format_amount(symbol: &str, amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{symbol}{:.2}", rounded.abs())
    } else {
        format!("{symbol}{:.2}", rounded.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_TICKET_AMOUNT, format_amount, parse_amount, percent_of};
    use rust_decimal::Decimal;

    #[test]
    fn parse_amount_strips_symbols() {
        assert_eq!(parse_amount("$1,200.50"), Some(Decimal::new(120_050, 2)));
        assert_eq!(parse_amount(" 500 "), Some(Decimal::from(500)));
        assert_eq!(parse_amount("-3"), Some(Decimal::from(-3)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("lots"), None);
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        // 1 / 8 = 12.5%
        assert_eq!(
            percent_of(Decimal::ONE, Decimal::from(8), 1),
            Some(Decimal::new(125, 1))
        );
        // 1 / 3 = 33.333..% -> 33.3
        assert_eq!(
            percent_of(Decimal::ONE, Decimal::from(3), 1),
            Some(Decimal::new(333, 1))
        );
        // 0.25 / 1000 = 0.025% -> 0.03 at 2 dp
        assert_eq!(
            percent_of(Decimal::new(25, 2), Decimal::from(1000), 2),
            Some(Decimal::new(3, 2))
        );
        assert_eq!(percent_of(Decimal::ONE, Decimal::ZERO, 1), None);
    }

    #[test]
    fn percent_of_tiny_whole_is_undefined_not_a_panic() {
        assert_eq!(percent_of(MAX_TICKET_AMOUNT, Decimal::new(1, 28), 1), None);
    }

    #[test]
    fn max_ticket_amount_is_one_trillion() {
        assert_eq!(MAX_TICKET_AMOUNT, Decimal::from(1_000_000_000_000_i64));
    }

    #[test]
    fn format_amount_pads_cents() {
        assert_eq!(format_amount("$", Decimal::from(1700)), "$1700.00");
        assert_eq!(format_amount("$", Decimal::new(-4005, 1)), "-$400.50");
    }
}
