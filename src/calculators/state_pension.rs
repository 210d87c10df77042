//! State Pension forecaster
//!
//! Entitlement is pro-rated on qualifying years up to the full-rate
//! requirement. Voluntary Class 3 contributions can fill missing years; the
//! forecast compares the pension with and without those years.

use chrono::{Datelike, NaiveDate};
use log::debug;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{
    check_age, check_range_u32, BreakdownItem, Calculator, CalculatorType, ProjectionPoint,
    ResultSummary,
};
use crate::constants::{PensionConstants, StatePensionConstants};
use crate::error::{CalcError, CalcResult};
use crate::money::{format_gbp, round_money, safe_ratio};

const WEEKS_PER_YEAR: Decimal = dec!(52);

/// Inputs for a State Pension forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePensionInput {
    pub date_of_birth: NaiveDate,
    /// Date the forecast is made (keeps the calculation pure)
    pub as_of: NaiveDate,
    /// Qualifying NI years already on record
    pub ni_years: u32,
    /// Missing years that could be filled voluntarily
    pub ni_gaps: u32,
    /// Further qualifying years expected before pension age
    #[serde(default)]
    pub planned_contributions: u32,
    /// Years spent working abroad
    #[serde(default)]
    pub overseas_years: u32,
}

/// State Pension forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePensionResult {
    pub current_age: u32,
    pub state_pension_age: u32,
    pub years_to_pension: u32,
    pub qualifying_years: u32,
    pub weekly_pension: Decimal,
    pub monthly_pension: Decimal,
    pub annual_pension: Decimal,
    /// Cost of buying all `ni_gaps` years at the Class 3 rate
    pub gap_filling_cost: Decimal,
    pub gap_filling_annual_benefit: Decimal,
    pub gap_filling_lifetime_benefit: Decimal,
    /// Years in payment before filling gaps pays for itself
    pub break_even_years: Option<Decimal>,
    /// Annual pension escalated at the triple-lock approximation
    pub projection: Vec<ProjectionPoint>,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl StatePensionResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self.annual_pension)
            .with("weekly_pension", self.weekly_pension)
            .with("monthly_pension", self.monthly_pension)
            .with("qualifying_years", Decimal::from(self.qualifying_years))
            .with("state_pension_age", Decimal::from(self.state_pension_age))
            .with("gap_filling_cost", self.gap_filling_cost)
            .with("gap_filling_annual_benefit", self.gap_filling_annual_benefit)
            .with("gap_filling_lifetime_benefit", self.gap_filling_lifetime_benefit)
            .with_breakdown(&self.breakdown)
    }
}

/// State Pension age by birth year band
pub fn state_pension_age(date_of_birth: NaiveDate) -> u32 {
    match date_of_birth.year() {
        y if y <= 1960 => 66,
        y if y <= 1977 => 67,
        _ => 68,
    }
}

/// Whole years between `date_of_birth` and `as_of`
pub fn age_on(date_of_birth: NaiveDate, as_of: NaiveDate) -> Option<u32> {
    if as_of < date_of_birth {
        return None;
    }
    let mut years = as_of.year() - date_of_birth.year();
    if (as_of.month(), as_of.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Forecasts State Pension entitlement and the value of filling NI gaps
pub struct StatePensionForecaster {
    rules: StatePensionConstants,
}

impl StatePensionForecaster {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            rules: constants.state_pension.clone(),
        }
    }

    /// Weekly pension for a number of qualifying years, capped at the full rate
    pub fn weekly_for_years(&self, qualifying_years: u32) -> Decimal {
        let capped = qualifying_years.min(self.rules.full_qualifying_years);
        round_money(
            self.rules.full_weekly_rate * Decimal::from(capped)
                / Decimal::from(self.rules.full_qualifying_years),
        )
    }

    fn validate(&self, input: &StatePensionInput) -> CalcResult<u32> {
        let age = age_on(input.date_of_birth, input.as_of).ok_or(CalcError::InvalidRange {
            field: "date_of_birth",
            reason: "date of birth is after the forecast date".to_string(),
        })?;
        check_age("age", age)?;
        check_range_u32("ni_years", input.ni_years, 0, 50)?;
        check_range_u32("ni_gaps", input.ni_gaps, 0, 50)?;
        check_range_u32("planned_contributions", input.planned_contributions, 0, 50)?;
        check_range_u32("overseas_years", input.overseas_years, 0, 50)?;
        Ok(age)
    }

    fn projection(&self, annual: Decimal, current_age: u32, years_to_pension: u32) -> Vec<ProjectionPoint> {
        let years = (years_to_pension + self.rules.years_in_payment).min(self.rules.max_projection_years);
        let escalation = Decimal::ONE + self.rules.triple_lock_rate;

        (0..years)
            .map(|year| ProjectionPoint {
                year,
                age: current_age + year,
                value: round_money(annual * escalation.powu(u64::from(year))),
            })
            .collect()
    }
}

impl Calculator for StatePensionForecaster {
    type Input = StatePensionInput;
    type Output = StatePensionResult;

    const KIND: CalculatorType = CalculatorType::StatePension;

    fn calculate(&self, input: &StatePensionInput) -> CalcResult<StatePensionResult> {
        let current_age = self.validate(input)?;
        let rules = &self.rules;

        let pension_age = state_pension_age(input.date_of_birth);
        let years_to_pension = pension_age.saturating_sub(current_age);
        let qualifying_years = input.ni_years + input.planned_contributions;

        let weekly = self.weekly_for_years(qualifying_years);
        let annual = weekly * WEEKS_PER_YEAR;
        let monthly = round_money(annual / dec!(12));

        let gap_cost = Decimal::from(input.ni_gaps) * rules.class3_weekly_rate * WEEKS_PER_YEAR;
        let weekly_with_gaps = self.weekly_for_years(qualifying_years + input.ni_gaps);
        let annual_benefit = (weekly_with_gaps - weekly) * WEEKS_PER_YEAR;
        let lifetime_benefit = annual_benefit * Decimal::from(rules.years_in_payment);
        let break_even_years = if annual_benefit.is_zero() {
            None
        } else {
            Some(safe_ratio(gap_cost, annual_benefit).round_dp(1))
        };

        let mut warnings = Vec::new();
        if qualifying_years < rules.min_qualifying_years {
            warnings.push(format!(
                "With {} qualifying years you are below the {} needed for any State Pension entitlement.",
                qualifying_years, rules.min_qualifying_years
            ));
        } else if qualifying_years < rules.full_qualifying_years {
            warnings.push(format!(
                "With {} qualifying years you are on track for a partial State Pension; {} are needed for the full rate.",
                qualifying_years, rules.full_qualifying_years
            ));
        }
        if input.ni_gaps > rules.max_purchasable_gap_years {
            warnings.push(format!(
                "Only the most recent {} missing years can normally be bought with voluntary contributions.",
                rules.max_purchasable_gap_years
            ));
        }
        if input.overseas_years > 0 {
            warnings.push(format!(
                "{} years abroad may affect your record; check whether they count towards your entitlement.",
                input.overseas_years
            ));
        }

        let breakdown = vec![
            BreakdownItem::new("NI years on record", Decimal::from(input.ni_years)),
            BreakdownItem::new("Planned future years", Decimal::from(input.planned_contributions)),
            BreakdownItem::new("Weekly pension", weekly),
            BreakdownItem::new("Annual pension", annual),
            BreakdownItem::new("Cost to fill gaps", gap_cost),
            BreakdownItem::new("Annual gain from filling gaps", annual_benefit),
        ];

        let assumptions = vec![
            format!("Full new State Pension of {} per week", format_gbp(rules.full_weekly_rate)),
            format!("Class 3 voluntary contributions at {} per week", format_gbp(rules.class3_weekly_rate)),
            format!("Pension increases of {}% a year", (rules.triple_lock_rate * Decimal::ONE_HUNDRED).normalize()),
            format!("Lifetime figures assume {} years in payment", rules.years_in_payment),
        ];

        debug!(
            "state pension forecast: age {} spa {} qualifying {} weekly {}",
            current_age, pension_age, qualifying_years, weekly
        );

        Ok(StatePensionResult {
            current_age,
            state_pension_age: pension_age,
            years_to_pension,
            qualifying_years,
            weekly_pension: weekly,
            monthly_pension: monthly,
            annual_pension: annual,
            gap_filling_cost: gap_cost,
            gap_filling_annual_benefit: annual_benefit,
            gap_filling_lifetime_benefit: lifetime_benefit,
            break_even_years,
            projection: self.projection(annual, current_age, years_to_pension),
            breakdown,
            warnings,
            assumptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn forecaster() -> StatePensionForecaster {
        StatePensionForecaster::new(&PensionConstants::default())
    }

    fn input(ni_years: u32, ni_gaps: u32, planned: u32) -> StatePensionInput {
        StatePensionInput {
            date_of_birth: NaiveDate::from_ymd_opt(1975, 6, 15).unwrap(),
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            ni_years,
            ni_gaps,
            planned_contributions: planned,
            overseas_years: 0,
        }
    }

    #[test]
    fn test_full_record_gets_full_rate() {
        let result = forecaster().calculate(&input(35, 0, 0)).unwrap();

        assert_eq!(result.weekly_pension, dec!(221.20));
        assert_eq!(result.annual_pension, dec!(11502.40));
        assert_eq!(result.gap_filling_cost, Decimal::ZERO);
        assert_eq!(result.gap_filling_annual_benefit, Decimal::ZERO);
        assert_eq!(result.gap_filling_lifetime_benefit, Decimal::ZERO);
        assert_eq!(result.break_even_years, None);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_pension_age_bands() {
        let d = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        assert_eq!(state_pension_age(d(1955)), 66);
        assert_eq!(state_pension_age(d(1960)), 66);
        assert_eq!(state_pension_age(d(1961)), 67);
        assert_eq!(state_pension_age(d(1977)), 67);
        assert_eq!(state_pension_age(d(1978)), 68);
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let dob = NaiveDate::from_ymd_opt(1975, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()), Some(49));
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()), Some(50));
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), None);
    }

    #[test]
    fn test_partial_record_with_gaps() {
        let result = forecaster().calculate(&input(20, 5, 0)).unwrap();

        // 221.20 * 20 / 35 = 126.40
        assert_eq!(result.weekly_pension, dec!(126.40));
        // 5 * 17.45 * 52
        assert_eq!(result.gap_filling_cost, dec!(4537));
        // 25 years: 221.20 * 25 / 35 = 158.00 -> +31.60/week
        assert_eq!(result.gap_filling_annual_benefit, dec!(1643.20));
        assert_eq!(result.gap_filling_lifetime_benefit, dec!(32864));
        assert_eq!(result.break_even_years, Some(dec!(2.8)));
        assert!(result.warnings.iter().any(|w| w.contains("partial")));
    }

    #[test]
    fn test_gap_benefit_capped_at_full_record() {
        let result = forecaster().calculate(&input(33, 10, 0)).unwrap();

        let full_annual = dec!(11502.40);
        assert_eq!(result.annual_pension + result.gap_filling_annual_benefit, full_annual);
        assert!(result.warnings.iter().any(|w| w.contains("most recent 6")));
    }

    #[test]
    fn test_no_entitlement_warning() {
        let result = forecaster().calculate(&input(5, 0, 3)).unwrap();
        assert_eq!(result.qualifying_years, 8);
        assert!(result.warnings.iter().any(|w| w.contains("below the 10")));
    }

    #[test]
    fn test_overseas_warning() {
        let mut i = input(30, 0, 5);
        i.overseas_years = 4;
        let result = forecaster().calculate(&i).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("abroad")));
    }

    #[test]
    fn test_projection_length_and_escalation() {
        let result = forecaster().calculate(&input(35, 0, 0)).unwrap();

        // age 49, pension age 67 -> 18 + 20 = 38 years
        assert_eq!(result.years_to_pension, 18);
        assert_eq!(result.projection.len(), 38);
        assert_eq!(result.projection[0].value, dec!(11502.40));
        assert_eq!(result.projection[1].value, dec!(11847.47));
        assert_eq!(result.projection[1].age, 50);

        let mut young = input(10, 0, 25);
        young.date_of_birth = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let result = forecaster().calculate(&young).unwrap();
        assert_eq!(result.projection.len(), 40);
    }

    #[test]
    fn test_validation_errors() {
        let f = forecaster();
        assert!(matches!(
            f.calculate(&input(51, 0, 0)),
            Err(CalcError::OutOfRange { field: "ni_years", .. })
        ));
        assert!(matches!(
            f.calculate(&input(10, 60, 0)),
            Err(CalcError::OutOfRange { field: "ni_gaps", .. })
        ));

        let mut child = input(0, 0, 0);
        child.date_of_birth = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        assert!(matches!(f.calculate(&child), Err(CalcError::OutOfRange { field: "age", .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_weekly_pension_non_decreasing_in_years(years in 0u32..50, extra in 0u32..10) {
            let f = forecaster();
            let fewer = f.calculate(&input(years, 0, 0)).unwrap();
            let more = f.calculate(&input((years + extra).min(50), 0, 0)).unwrap();
            prop_assert!(more.weekly_pension >= fewer.weekly_pension);
        }

        #[test]
        fn prop_full_years_means_full_rate(years in 35u32..=50) {
            let result = forecaster().calculate(&input(years, 0, 0)).unwrap();
            prop_assert_eq!(result.weekly_pension, dec!(221.20));
        }
    }
}
