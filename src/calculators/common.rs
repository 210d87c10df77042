//! Types and validation shared by every calculator

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CalcError, CalcResult};

/// Calculator identifiers, serialized with the kebab-case names used in links
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalculatorType {
    StatePension,
    WorkplacePension,
    TaxRelief,
    PensionDrawdown,
    LumpSumTax,
    Sipp,
    Annuity,
}

impl CalculatorType {
    pub const ALL: [CalculatorType; 7] = [
        CalculatorType::StatePension,
        CalculatorType::WorkplacePension,
        CalculatorType::TaxRelief,
        CalculatorType::PensionDrawdown,
        CalculatorType::LumpSumTax,
        CalculatorType::Sipp,
        CalculatorType::Annuity,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            CalculatorType::StatePension => "state-pension",
            CalculatorType::WorkplacePension => "workplace-pension",
            CalculatorType::TaxRelief => "tax-relief",
            CalculatorType::PensionDrawdown => "pension-drawdown",
            CalculatorType::LumpSumTax => "lump-sum-tax",
            CalculatorType::Sipp => "sipp",
            CalculatorType::Annuity => "annuity",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }

    /// Human readable title
    pub fn title(&self) -> &'static str {
        match self {
            CalculatorType::StatePension => "State Pension Forecast",
            CalculatorType::WorkplacePension => "Workplace Pension Projection",
            CalculatorType::TaxRelief => "Pension Tax Relief",
            CalculatorType::PensionDrawdown => "Drawdown Sustainability",
            CalculatorType::LumpSumTax => "Lump Sum Tax",
            CalculatorType::Sipp => "SIPP Projection",
            CalculatorType::Annuity => "Annuity Income",
        }
    }
}

impl fmt::Display for CalculatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One labelled line of a result breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub label: String,
    pub value: Decimal,
}

impl BreakdownItem {
    pub fn new(label: impl Into<String>, value: Decimal) -> Self {
        Self { label: label.into(), value }
    }
}

/// A point on a year-by-year value series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    /// Years from today (0 = now)
    pub year: u32,
    pub age: u32,
    pub value: Decimal,
}

/// Journey-scoped summary of a calculator result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub primary_value: Decimal,
    #[serde(default)]
    pub secondary: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub breakdown: Vec<BreakdownItem>,
}

impl ResultSummary {
    pub fn new(primary_value: Decimal) -> Self {
        Self {
            primary_value,
            ..Default::default()
        }
    }

    pub fn with(mut self, key: &str, value: Decimal) -> Self {
        self.secondary.insert(key.to_string(), value);
        self
    }

    pub fn with_breakdown(mut self, breakdown: &[BreakdownItem]) -> Self {
        self.breakdown = breakdown.to_vec();
        self
    }

    pub fn secondary(&self, key: &str) -> Option<Decimal> {
        self.secondary.get(key).copied()
    }
}

/// A pure calculation over typed inputs
///
/// Implementations never perform I/O and always return the same output for
/// the same input.
pub trait Calculator {
    type Input;
    type Output;

    /// Which calculator this is
    const KIND: CalculatorType;

    /// Validate `input` and compute the result
    fn calculate(&self, input: &Self::Input) -> CalcResult<Self::Output>;
}

/// Upper bound for any single money input
pub const MAX_AMOUNT: Decimal = dec!(100000000);

pub(crate) fn check_range_u32(field: &'static str, value: u32, min: u32, max: u32) -> CalcResult<()> {
    if value < min || value > max {
        return Err(CalcError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_range(field: &'static str, value: Decimal, min: Decimal, max: Decimal) -> CalcResult<()> {
    if value < min || value > max {
        return Err(CalcError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_amount(field: &'static str, value: Decimal) -> CalcResult<()> {
    check_range(field, value, Decimal::ZERO, MAX_AMOUNT)
}

pub(crate) fn check_age(field: &'static str, age: u32) -> CalcResult<()> {
    check_range_u32(field, age, 16, 100)
}

pub(crate) fn check_retirement_after(current_age: u32, retirement_age: u32) -> CalcResult<()> {
    if retirement_age <= current_age {
        return Err(CalcError::InvalidRange {
            field: "retirement_age",
            reason: format!(
                "retirement age {} must be greater than current age {}",
                retirement_age, current_age
            ),
        });
    }
    Ok(())
}

pub(crate) fn check_growth_pct(field: &'static str, value: Decimal) -> CalcResult<()> {
    check_range(field, value, Decimal::ZERO, dec!(20))
}

pub(crate) fn check_charges_pct(field: &'static str, value: Decimal) -> CalcResult<()> {
    check_range(field, value, Decimal::ZERO, dec!(5))
}

pub(crate) fn check_inflation_pct(field: &'static str, value: Decimal) -> CalcResult<()> {
    check_range(field, value, Decimal::ZERO, dec!(15))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_round_trip() {
        for kind in CalculatorType::ALL {
            assert_eq!(CalculatorType::from_slug(kind.slug()), Some(kind));
        }
        assert_eq!(CalculatorType::from_slug("pension-calculator"), None);
    }

    #[test]
    fn test_serde_uses_slug() {
        let json = serde_json::to_string(&CalculatorType::PensionDrawdown).unwrap();
        assert_eq!(json, "\"pension-drawdown\"");
    }

    #[test]
    fn test_retirement_must_follow_current_age() {
        assert!(check_retirement_after(40, 41).is_ok());
        let err = check_retirement_after(65, 65).unwrap_err();
        assert!(matches!(err, CalcError::InvalidRange { field: "retirement_age", .. }));
    }

    #[test]
    fn test_age_range() {
        assert!(check_age("age", 16).is_ok());
        assert!(check_age("age", 100).is_ok());
        assert!(check_age("age", 15).is_err());
        assert!(check_age("age", 101).is_err());
    }
}
