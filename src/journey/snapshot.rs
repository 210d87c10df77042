//! Financial snapshot derived from completed calculators

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::types::{FinancialSnapshot, JourneyCalculatorResult};
use crate::calculators::{CalculatorInput, CalculatorType};

/// Rebuild the snapshot from scratch. Pure: the same calculators and age
/// always give the same snapshot.
pub fn build_snapshot(
    calculators: &BTreeMap<CalculatorType, JourneyCalculatorResult>,
    profile_age: Option<u32>,
) -> FinancialSnapshot {
    let completed = move |kind: CalculatorType| calculators.get(&kind).filter(|r| r.completed);
    let secondary = move |kind: CalculatorType, key: &str| completed(kind).and_then(|r| r.results.secondary(key));

    let state_pension = completed(CalculatorType::StatePension);
    let workplace = completed(CalculatorType::WorkplacePension);
    let sipp = completed(CalculatorType::Sipp);
    let drawdown = completed(CalculatorType::PensionDrawdown);
    let annuity = completed(CalculatorType::Annuity);

    let state_pension_amount = state_pension.map(|r| r.results.primary_value).unwrap_or_default();

    let mut workplace_pot = Decimal::ZERO;
    let mut personal_pot = Decimal::ZERO;
    let mut drawdown_pot = None;
    let mut annuity_pot = None;
    let mut desired_withdrawal = None;
    // (current age, retirement age) from the first accumulation calculator that has one
    let mut ages = None;

    for result in [workplace, sipp, drawdown, annuity].into_iter().flatten() {
        match &result.inputs {
            CalculatorInput::WorkplacePension(i) => {
                workplace_pot = i.current_pot_value;
                ages = ages.or(Some((i.current_age, i.retirement_age)));
            }
            CalculatorInput::Sipp(i) => {
                personal_pot = i.current_value;
                ages = ages.or(Some((i.current_age, i.retirement_age)));
            }
            CalculatorInput::PensionDrawdown(i) => {
                drawdown_pot = Some(i.current_pot);
                desired_withdrawal = Some(i.annual_withdrawal);
                ages = ages.or(Some((i.current_age, i.retirement_age)));
            }
            CalculatorInput::Annuity(i) => annuity_pot = Some(i.pot_value),
            _ => {}
        }
    }

    let mut total_current_pot = workplace_pot + personal_pot;
    if total_current_pot.is_zero() {
        total_current_pot = drawdown_pot.or(annuity_pot).unwrap_or_default();
    }

    let mut projected_retirement_income = state_pension_amount
        + secondary(CalculatorType::WorkplacePension, "annual_income").unwrap_or_default()
        + secondary(CalculatorType::Sipp, "annual_income").unwrap_or_default();
    if workplace.is_none() && sipp.is_none() {
        projected_retirement_income += secondary(CalculatorType::PensionDrawdown, "sustainable_withdrawal")
            .or_else(|| annuity.map(|r| r.results.primary_value))
            .unwrap_or_default();
    }

    let desired_retirement_income = desired_withdrawal
        .map(|w| w + state_pension_amount)
        .unwrap_or_default();
    let pension_gap = if desired_retirement_income > Decimal::ZERO {
        desired_retirement_income - projected_retirement_income
    } else {
        Decimal::ZERO
    };

    let state_pension_age = secondary(CalculatorType::StatePension, "state_pension_age")
        .and_then(|age| age.to_u32());
    let retirement_age = ages.map(|(_, retire)| retire).or(state_pension_age);
    let current_age = profile_age.or(ages.map(|(current, _)| current));
    let years_to_retirement = match (retirement_age, current_age) {
        (Some(retire), Some(current)) => Some(retire.saturating_sub(current)),
        _ => None,
    };

    FinancialSnapshot {
        state_pension_amount,
        workplace_pot,
        personal_pot,
        total_current_pot,
        desired_retirement_income,
        projected_retirement_income,
        pension_gap,
        retirement_age,
        years_to_retirement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{
        run, CalculatorInput, DcProjectionInput, DrawdownInput, StatePensionInput,
    };
    use crate::constants::PensionConstants;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn completed(input: CalculatorInput) -> (CalculatorType, JourneyCalculatorResult) {
        let output = run(&input, &PensionConstants::default()).unwrap();
        (
            input.kind(),
            JourneyCalculatorResult {
                completed: true,
                completed_at: Utc::now(),
                inputs: input,
                results: output.summary(),
                session_duration_secs: 0,
            },
        )
    }

    fn state_pension() -> CalculatorInput {
        CalculatorInput::StatePension(StatePensionInput {
            date_of_birth: NaiveDate::from_ymd_opt(1970, 6, 1).unwrap(),
            as_of: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            ni_years: 35,
            ni_gaps: 0,
            planned_contributions: 0,
            overseas_years: 0,
        })
    }

    fn workplace() -> CalculatorInput {
        CalculatorInput::WorkplacePension(DcProjectionInput {
            current_age: 54,
            retirement_age: 55,
            current_pot_value: dec!(80000),
            monthly_contribution: Decimal::ZERO,
            employer_contribution: Decimal::ZERO,
            tax_relief_at_source: false,
            annual_growth_pct: Some(Decimal::ZERO),
            annual_charges_pct: Some(Decimal::ZERO),
            inflation_pct: Some(Decimal::ZERO),
            lump_sum_pct: Some(Decimal::ZERO),
            income_method: None,
        })
    }

    fn drawdown(withdrawal: Decimal) -> CalculatorInput {
        CalculatorInput::PensionDrawdown(DrawdownInput {
            current_age: 54,
            retirement_age: 60,
            life_expectancy: 90,
            current_pot: dec!(150000),
            monthly_contribution: Decimal::ZERO,
            annual_withdrawal: withdrawal,
            annual_growth_pct: Some(Decimal::ZERO),
            annual_charges_pct: Some(Decimal::ZERO),
            inflation_pct: Some(Decimal::ZERO),
            lump_sum_pct: Some(Decimal::ZERO),
        })
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = build_snapshot(&BTreeMap::new(), Some(40));
        assert_eq!(snapshot, FinancialSnapshot::default());
    }

    #[test]
    fn test_state_pension_primary_value_becomes_amount() {
        let calculators = BTreeMap::from([completed(state_pension())]);
        let snapshot = build_snapshot(&calculators, Some(54));

        assert_eq!(snapshot.state_pension_amount, dec!(11502.40));
        assert_eq!(snapshot.projected_retirement_income, dec!(11502.40));
        assert_eq!(snapshot.retirement_age, Some(67));
        assert_eq!(snapshot.years_to_retirement, Some(13));
        assert_eq!(snapshot.pension_gap, Decimal::ZERO);
    }

    #[test]
    fn test_gap_from_drawdown_target() {
        let calculators = BTreeMap::from([
            completed(state_pension()),
            completed(workplace()),
            completed(drawdown(dec!(30000))),
        ]);
        let snapshot = build_snapshot(&calculators, None);

        assert_eq!(snapshot.workplace_pot, dec!(80000));
        assert_eq!(snapshot.total_current_pot, dec!(80000));
        // 80000 pot, no lump sum, 4% drawdown
        assert_eq!(snapshot.projected_retirement_income, dec!(11502.40) + dec!(3200));
        assert_eq!(snapshot.desired_retirement_income, dec!(41502.40));
        assert_eq!(snapshot.pension_gap, dec!(26800));
        assert_eq!(snapshot.retirement_age, Some(55));
        assert_eq!(snapshot.years_to_retirement, Some(1));
    }

    #[test]
    fn test_drawdown_alone_supplies_pot_and_income() {
        let calculators = BTreeMap::from([completed(drawdown(dec!(5000)))]);
        let snapshot = build_snapshot(&calculators, Some(54));

        assert_eq!(snapshot.total_current_pot, dec!(150000));
        // 150000 spread level over 30 years
        assert_eq!(snapshot.projected_retirement_income, dec!(5000));
        assert_eq!(snapshot.pension_gap, Decimal::ZERO);
        assert_eq!(snapshot.years_to_retirement, Some(6));
    }

    #[test]
    fn test_incomplete_results_ignored() {
        let (kind, mut result) = completed(workplace());
        result.completed = false;
        let snapshot = build_snapshot(&BTreeMap::from([(kind, result)]), None);
        assert_eq!(snapshot.total_current_pot, Decimal::ZERO);
    }
}
