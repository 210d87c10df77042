//! Defined-contribution (workplace pension) growth projector

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{
    check_age, check_amount, check_charges_pct, check_growth_pct, check_inflation_pct,
    check_range, check_retirement_after, BreakdownItem, Calculator, CalculatorType, ResultSummary,
};
use super::growth::{relief_at_source, totals, AccumulationPlan, GrowthYear, IncomeMethod};
use crate::constants::PensionConstants;
use crate::error::CalcResult;
use crate::money::{annualise, format_gbp, pct, round_money};

/// Inputs for a workplace pension projection. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcProjectionInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_pot_value: Decimal,
    /// Personal contribution per month (net of relief when relief is at source)
    pub monthly_contribution: Decimal,
    /// Employer contribution per month
    #[serde(default)]
    pub employer_contribution: Decimal,
    /// Gross up personal contributions for basic-rate relief
    #[serde(default)]
    pub tax_relief_at_source: bool,
    #[serde(default)]
    pub annual_growth_pct: Option<Decimal>,
    #[serde(default)]
    pub annual_charges_pct: Option<Decimal>,
    #[serde(default)]
    pub inflation_pct: Option<Decimal>,
    /// Requested tax-free lump sum; capped at 25%
    #[serde(default)]
    pub lump_sum_pct: Option<Decimal>,
    /// Defaults to drawdown at the constants' default rate
    #[serde(default)]
    pub income_method: Option<IncomeMethod>,
}

/// Workplace pension projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcProjectionResult {
    pub years_to_retirement: u32,
    pub projected_pot: Decimal,
    /// Projected pot in today's money
    pub real_value: Decimal,
    pub annual_personal_contribution: Decimal,
    pub annual_employer_contribution: Decimal,
    pub annual_tax_relief: Decimal,
    pub total_contributions: Decimal,
    pub total_tax_relief: Decimal,
    pub total_growth: Decimal,
    pub total_charges: Decimal,
    pub tax_free_lump_sum: Decimal,
    pub remaining_pot: Decimal,
    pub income_method: IncomeMethod,
    pub annual_income: Decimal,
    pub monthly_income: Decimal,
    pub yearly_projection: Vec<GrowthYear>,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl DcProjectionResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self.projected_pot)
            .with("real_value", self.real_value)
            .with("annual_income", self.annual_income)
            .with("monthly_income", self.monthly_income)
            .with("tax_free_lump_sum", self.tax_free_lump_sum)
            .with("total_contributions", self.total_contributions)
            .with("total_growth", self.total_growth)
            .with("years_to_retirement", Decimal::from(self.years_to_retirement))
            .with_breakdown(&self.breakdown)
    }
}

/// Projects a DC pot to retirement and estimates the income it supports
pub struct DcPensionProjector {
    constants: PensionConstants,
}

impl DcPensionProjector {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            constants: constants.clone(),
        }
    }

    fn validate(&self, input: &DcProjectionInput) -> CalcResult<()> {
        check_age("current_age", input.current_age)?;
        check_age("retirement_age", input.retirement_age)?;
        check_retirement_after(input.current_age, input.retirement_age)?;
        check_amount("current_pot_value", input.current_pot_value)?;
        check_amount("monthly_contribution", input.monthly_contribution)?;
        check_amount("employer_contribution", input.employer_contribution)?;
        if let Some(g) = input.annual_growth_pct {
            check_growth_pct("annual_growth_pct", g)?;
        }
        if let Some(c) = input.annual_charges_pct {
            check_charges_pct("annual_charges_pct", c)?;
        }
        if let Some(i) = input.inflation_pct {
            check_inflation_pct("inflation_pct", i)?;
        }
        if let Some(l) = input.lump_sum_pct {
            check_range("lump_sum_pct", l, Decimal::ZERO, Decimal::ONE_HUNDRED)?;
        }
        if let Some(m) = input.income_method {
            check_range("income_method.rate_pct", m.rate_pct(), Decimal::ZERO, dec!(20))?;
        }
        Ok(())
    }
}

impl Calculator for DcPensionProjector {
    type Input = DcProjectionInput;
    type Output = DcProjectionResult;

    const KIND: CalculatorType = CalculatorType::WorkplacePension;

    fn calculate(&self, input: &DcProjectionInput) -> CalcResult<DcProjectionResult> {
        self.validate(input)?;
        let defaults = &self.constants.assumptions;

        let growth_pct = input.annual_growth_pct.unwrap_or(defaults.growth_pct);
        let charges_pct = input.annual_charges_pct.unwrap_or(defaults.charges_pct);
        let inflation_pct = input.inflation_pct.unwrap_or(defaults.inflation_pct);
        let years = input.retirement_age - input.current_age;

        let personal = annualise(input.monthly_contribution);
        let employer = annualise(input.employer_contribution);
        let relief = if input.tax_relief_at_source {
            relief_at_source(personal, self.constants.income_tax.rest_of_uk.basic_rate())
        } else {
            Decimal::ZERO
        };

        let plan = AccumulationPlan {
            opening_balance: input.current_pot_value,
            start_age: input.current_age,
            years,
            annual_contribution: personal + employer + relief,
            annual_tax_relief: relief,
            growth_rate: pct(growth_pct),
            charge_rate: pct(charges_pct),
            inflation_rate: pct(inflation_pct),
        };
        let rows = plan.project();
        let t = totals(&rows);

        let (projected_pot, real_value) = rows
            .last()
            .map(|r| (r.closing_balance, r.real_value))
            .unwrap_or((input.current_pot_value, input.current_pot_value));

        let max_lump_pct = (self.constants.allowances.tax_free_lump_sum_rate * Decimal::ONE_HUNDRED).normalize();
        let lump_pct = input.lump_sum_pct.unwrap_or(max_lump_pct).min(max_lump_pct);
        let tax_free_lump_sum = round_money(projected_pot * pct(lump_pct));
        let remaining_pot = projected_pot - tax_free_lump_sum;

        let income_method = input.income_method.unwrap_or(IncomeMethod::Drawdown {
            rate_pct: defaults.drawdown_pct,
        });
        let annual_income = income_method.annual_income(remaining_pot);
        let monthly_income = round_money(annual_income / dec!(12));

        let mut warnings = Vec::new();
        if charges_pct > Decimal::ONE {
            warnings.push(format!(
                "Charges of {}% a year are high; many workplace schemes charge under 0.75%.",
                charges_pct
            ));
        }
        if growth_pct > dec!(8) {
            warnings.push(format!("A growth rate of {}% a year is optimistic.", growth_pct));
        }
        if personal.is_zero() && employer.is_zero() {
            warnings.push("No ongoing contributions: the pot grows from investment returns only.".to_string());
        }
        if input.lump_sum_pct.is_some_and(|l| l > max_lump_pct) {
            warnings.push(format!("The tax-free lump sum is limited to {}% of the pot.", max_lump_pct));
        }

        let breakdown = vec![
            BreakdownItem::new("Current pot", input.current_pot_value),
            BreakdownItem::new("Your contributions", personal * Decimal::from(years)),
            BreakdownItem::new("Employer contributions", employer * Decimal::from(years)),
            BreakdownItem::new("Tax relief", t.tax_relief),
            BreakdownItem::new("Investment growth", t.growth),
            BreakdownItem::new("Charges", -t.charges),
            BreakdownItem::new("Projected pot", projected_pot),
        ];

        let assumptions = vec![
            format!("Investment growth of {}% a year", growth_pct),
            format!("Annual charges of {}%", charges_pct),
            format!("Inflation of {}% a year for today's-money figures", inflation_pct),
            "Contributions paid evenly through each year".to_string(),
            format!(
                "Income of {}% a year from the pot after a {} lump sum",
                income_method.rate_pct(),
                format_gbp(tax_free_lump_sum)
            ),
        ];

        debug!(
            "dc projection: {} years, pot {} -> {}",
            years, input.current_pot_value, projected_pot
        );

        Ok(DcProjectionResult {
            years_to_retirement: years,
            projected_pot,
            real_value,
            annual_personal_contribution: personal,
            annual_employer_contribution: employer,
            annual_tax_relief: relief,
            total_contributions: t.contributions,
            total_tax_relief: t.tax_relief,
            total_growth: t.growth,
            total_charges: t.charges,
            tax_free_lump_sum,
            remaining_pot,
            income_method,
            annual_income,
            monthly_income,
            yearly_projection: rows,
            breakdown,
            warnings,
            assumptions,
        })
    }
}
