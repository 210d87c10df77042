//! Decimal helpers for currency amounts and percentages
//!
//! Fields suffixed `_pct` hold 0-100 values and fields suffixed `_rate` hold
//! 0-1 fractions. [`pct`] is the only conversion between the two.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Round a currency amount to whole pence (half away from zero)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a 0-100 percentage into a 0-1 fraction
pub fn pct(value_pct: Decimal) -> Decimal {
    value_pct / Decimal::ONE_HUNDRED
}

/// Convert a 0-1 fraction into a 0-100 percentage
pub fn to_pct(rate: Decimal) -> Decimal {
    rate * Decimal::ONE_HUNDRED
}

/// Divide, returning zero when the denominator is zero
pub fn safe_ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Clamp a value at zero from below
pub fn non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

/// Format an amount as GBP, e.g. `£11,502.40` or `-£1,000.00`
pub fn format_gbp(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}£{grouped}.{frac}")
}

/// Format a 0-1 rate as a percentage with one decimal place, e.g. `4.5%`
pub fn format_rate(rate: Decimal) -> String {
    format!("{:.1}%", to_pct(rate).round_dp(1))
}

/// Annual amount of a monthly figure
pub fn annualise(monthly: Decimal) -> Decimal {
    monthly * dec!(12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn test_safe_ratio_zero_denominator() {
        assert_eq!(safe_ratio(dec!(100), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_ratio(dec!(1), dec!(4)), dec!(0.25));
    }

    #[test]
    fn test_format_gbp() {
        assert_eq!(format_gbp(dec!(11502.4)), "£11,502.40");
        assert_eq!(format_gbp(dec!(999)), "£999.00");
        assert_eq!(format_gbp(dec!(1234567.891)), "£1,234,567.89");
        assert_eq!(format_gbp(dec!(-1000)), "-£1,000.00");
        assert_eq!(format_gbp(Decimal::ZERO), "£0.00");
    }

    #[test]
    fn test_pct_round_trip_units() {
        assert_eq!(pct(dec!(4.25)), dec!(0.0425));
        assert_eq!(to_pct(dec!(0.0425)), dec!(4.25));
        assert_eq!(format_rate(dec!(0.045)), "4.5%");
    }
}
