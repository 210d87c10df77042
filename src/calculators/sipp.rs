//! SIPP (self-invested personal pension) projector
//!
//! Net contributions are grossed up at the basic rate and invested; any
//! higher-rate relief is reclaimed by the saver through their tax return and
//! is reported but not invested.

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{
    check_age, check_amount, check_charges_pct, check_growth_pct, check_inflation_pct, check_range,
    check_retirement_after, BreakdownItem, Calculator, CalculatorType, ResultSummary,
};
use super::growth::{relief_at_source, totals, AccumulationPlan, GrowthYear};
use super::tax_relief::higher_rate_reclaim;
use crate::constants::PensionConstants;
use crate::error::CalcResult;
use crate::money::{annualise, format_gbp, pct, round_money};

/// Platform fee assumed when none is given, as a percentage
pub const DEFAULT_PLATFORM_FEE_PCT: Decimal = dec!(0.25);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SippInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_value: Decimal,
    /// Net personal contribution per month
    pub monthly_contribution: Decimal,
    /// Net single contribution paid now
    #[serde(default)]
    pub one_off_contribution: Decimal,
    /// Taxable income, used to work out higher-rate relief
    #[serde(default)]
    pub annual_income: Decimal,
    #[serde(default)]
    pub scottish_taxpayer: bool,
    #[serde(default)]
    pub annual_growth_pct: Option<Decimal>,
    #[serde(default)]
    pub platform_fee_pct: Option<Decimal>,
    #[serde(default)]
    pub fund_charges_pct: Option<Decimal>,
    #[serde(default)]
    pub inflation_pct: Option<Decimal>,
    #[serde(default)]
    pub lump_sum_pct: Option<Decimal>,
    #[serde(default)]
    pub drawdown_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SippResult {
    pub years_to_retirement: u32,
    pub projected_value: Decimal,
    pub real_value: Decimal,
    pub annual_net_contribution: Decimal,
    pub annual_tax_relief: Decimal,
    pub annual_gross_contribution: Decimal,
    pub one_off_tax_relief: Decimal,
    /// Gross contributions invested, one-off included
    pub total_contributions: Decimal,
    /// Basic-rate relief added to the pot
    pub total_tax_relief: Decimal,
    pub annual_higher_rate_reclaim: Decimal,
    pub total_higher_rate_reclaim: Decimal,
    pub total_growth: Decimal,
    pub total_charges: Decimal,
    /// Platform fee plus fund charges, as a percentage
    pub total_charges_pct: Decimal,
    pub tax_free_lump_sum: Decimal,
    pub remaining_pot: Decimal,
    pub annual_income: Decimal,
    pub monthly_income: Decimal,
    /// Net contributions less higher-rate relief reclaimed
    pub net_cost: Decimal,
    pub yearly_projection: Vec<GrowthYear>,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl SippResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self.projected_value)
            .with("real_value", self.real_value)
            .with("annual_income", self.annual_income)
            .with("monthly_income", self.monthly_income)
            .with("tax_free_lump_sum", self.tax_free_lump_sum)
            .with("total_tax_relief", self.total_tax_relief + self.total_higher_rate_reclaim)
            .with("years_to_retirement", Decimal::from(self.years_to_retirement))
            .with_breakdown(&self.breakdown)
    }
}

pub struct SippProjector {
    constants: PensionConstants,
}

impl SippProjector {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            constants: constants.clone(),
        }
    }

    fn validate(&self, input: &SippInput) -> CalcResult<()> {
        check_age("current_age", input.current_age)?;
        check_age("retirement_age", input.retirement_age)?;
        check_retirement_after(input.current_age, input.retirement_age)?;
        check_amount("current_value", input.current_value)?;
        check_amount("monthly_contribution", input.monthly_contribution)?;
        check_amount("one_off_contribution", input.one_off_contribution)?;
        check_amount("annual_income", input.annual_income)?;
        if let Some(g) = input.annual_growth_pct {
            check_growth_pct("annual_growth_pct", g)?;
        }
        if let Some(f) = input.platform_fee_pct {
            check_charges_pct("platform_fee_pct", f)?;
        }
        if let Some(f) = input.fund_charges_pct {
            check_charges_pct("fund_charges_pct", f)?;
        }
        if let Some(i) = input.inflation_pct {
            check_inflation_pct("inflation_pct", i)?;
        }
        if let Some(l) = input.lump_sum_pct {
            check_range("lump_sum_pct", l, Decimal::ZERO, Decimal::ONE_HUNDRED)?;
        }
        if let Some(d) = input.drawdown_pct {
            check_range("drawdown_pct", d, Decimal::ZERO, dec!(20))?;
        }
        Ok(())
    }
}

impl Calculator for SippProjector {
    type Input = SippInput;
    type Output = SippResult;

    const KIND: CalculatorType = CalculatorType::Sipp;

    fn calculate(&self, input: &SippInput) -> CalcResult<SippResult> {
        self.validate(input)?;
        let defaults = &self.constants.assumptions;
        let allowances = &self.constants.allowances;

        let growth_pct = input.annual_growth_pct.unwrap_or(defaults.growth_pct);
        let platform_pct = input.platform_fee_pct.unwrap_or(DEFAULT_PLATFORM_FEE_PCT);
        let fund_pct = input.fund_charges_pct.unwrap_or(defaults.charges_pct);
        let charges_pct = platform_pct + fund_pct;
        let inflation_pct = input.inflation_pct.unwrap_or(defaults.inflation_pct);
        let drawdown_pct = input.drawdown_pct.unwrap_or(defaults.drawdown_pct);
        let years = input.retirement_age - input.current_age;

        // Relief at source is always paid at the UK basic rate
        let basic_rate = self.constants.income_tax.rest_of_uk.basic_rate();
        let annual_net = annualise(input.monthly_contribution);
        let annual_relief = relief_at_source(annual_net, basic_rate);
        let annual_gross = annual_net + annual_relief;
        let one_off_relief = relief_at_source(input.one_off_contribution, basic_rate);
        let one_off_gross = input.one_off_contribution + one_off_relief;

        let schedule = self.constants.income_tax.schedule(input.scottish_taxpayer);
        let annual_reclaim = higher_rate_reclaim(schedule, input.annual_income, annual_gross);
        let one_off_reclaim = higher_rate_reclaim(schedule, input.annual_income, one_off_gross);
        let total_reclaim = annual_reclaim * Decimal::from(years) + one_off_reclaim;

        let plan = AccumulationPlan {
            opening_balance: input.current_value + one_off_gross,
            start_age: input.current_age,
            years,
            annual_contribution: annual_gross,
            annual_tax_relief: annual_relief,
            growth_rate: pct(growth_pct),
            charge_rate: pct(charges_pct),
            inflation_rate: pct(inflation_pct),
        };
        let rows = plan.project();
        let t = totals(&rows);
        let (projected_value, real_value) = rows
            .last()
            .map(|r| (r.closing_balance, r.real_value))
            .unwrap_or((plan.opening_balance, plan.opening_balance));

        let max_lump_pct = (allowances.tax_free_lump_sum_rate * Decimal::ONE_HUNDRED).normalize();
        let lump_pct = input.lump_sum_pct.unwrap_or(max_lump_pct).min(max_lump_pct);
        let uncapped_lump = round_money(projected_value * pct(lump_pct));
        let tax_free_lump_sum = uncapped_lump.min(allowances.lump_sum_allowance);
        let remaining_pot = projected_value - tax_free_lump_sum;
        let annual_income = round_money(remaining_pot * pct(drawdown_pct));

        let net_contributions = annual_net * Decimal::from(years) + input.one_off_contribution;
        let net_cost = net_contributions - total_reclaim;

        let mut warnings = Vec::new();
        if uncapped_lump > tax_free_lump_sum {
            warnings.push(format!(
                "The tax-free lump sum is capped by the lump sum allowance of {}.",
                format_gbp(allowances.lump_sum_allowance)
            ));
        }
        if annual_gross + one_off_gross > allowances.annual_allowance {
            warnings.push(format!(
                "Gross contributions above {} in a year exceed the annual allowance unless carry-forward is available.",
                format_gbp(allowances.annual_allowance)
            ));
        }
        if input.annual_income.is_zero() && annual_gross > dec!(3600) {
            warnings.push("Without earnings, relief is limited to gross contributions of £3,600 a year.".to_string());
        }
        if charges_pct > dec!(1.5) {
            warnings.push(format!("Total charges of {}% a year are high for a SIPP.", charges_pct));
        }

        let breakdown = vec![
            BreakdownItem::new("Current value", input.current_value),
            BreakdownItem::new("Your net contributions", net_contributions),
            BreakdownItem::new("Basic rate relief added", t.tax_relief + one_off_relief),
            BreakdownItem::new("Investment growth", t.growth),
            BreakdownItem::new("Platform and fund charges", -t.charges),
            BreakdownItem::new("Projected value", projected_value),
            BreakdownItem::new("Higher rate relief reclaimed", total_reclaim),
        ];

        let assumptions = vec![
            format!("Investment growth of {}% a year", growth_pct),
            format!("Platform fee of {}% and fund charges of {}%", platform_pct, fund_pct),
            format!("Inflation of {}% a year for today's-money figures", inflation_pct),
            format!("Basic rate relief of {}% added by the provider", (basic_rate * Decimal::ONE_HUNDRED).normalize()),
            format!("Drawdown income of {}% a year after the lump sum", drawdown_pct),
        ];

        debug!(
            "sipp: {} years, value {} -> {}, reclaim {}",
            years, input.current_value, projected_value, total_reclaim
        );

        Ok(SippResult {
            years_to_retirement: years,
            projected_value,
            real_value,
            annual_net_contribution: annual_net,
            annual_tax_relief: annual_relief,
            annual_gross_contribution: annual_gross,
            one_off_tax_relief: one_off_relief,
            total_contributions: t.contributions + one_off_gross,
            total_tax_relief: t.tax_relief + one_off_relief,
            annual_higher_rate_reclaim: annual_reclaim,
            total_higher_rate_reclaim: total_reclaim,
            total_growth: t.growth,
            total_charges: t.charges,
            total_charges_pct: charges_pct,
            tax_free_lump_sum,
            remaining_pot,
            annual_income,
            monthly_income: round_money(annual_income / dec!(12)),
            net_cost,
            yearly_projection: rows,
            breakdown,
            warnings,
            assumptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalcError;

    fn projector() -> SippProjector {
        SippProjector::new(&PensionConstants::default())
    }

    fn input() -> SippInput {
        SippInput {
            current_age: 50,
            retirement_age: 51,
            current_value: dec!(20000),
            monthly_contribution: dec!(80),
            one_off_contribution: Decimal::ZERO,
            annual_income: dec!(30000),
            scottish_taxpayer: false,
            annual_growth_pct: Some(dec!(5)),
            platform_fee_pct: Some(Decimal::ZERO),
            fund_charges_pct: Some(Decimal::ZERO),
            inflation_pct: Some(Decimal::ZERO),
            lump_sum_pct: None,
            drawdown_pct: None,
        }
    }

    #[test]
    fn test_basic_rate_gross_up_invested() {
        let result = projector().calculate(&input()).unwrap();

        assert_eq!(result.annual_net_contribution, dec!(960));
        assert_eq!(result.annual_tax_relief, dec!(240));
        assert_eq!(result.annual_gross_contribution, dec!(1200));
        // (20000 + 600) * 5%
        assert_eq!(result.total_growth, dec!(1030));
        assert_eq!(result.projected_value, dec!(22230));
        assert_eq!(result.annual_higher_rate_reclaim, Decimal::ZERO);
        assert_eq!(result.tax_free_lump_sum, dec!(5557.50));
        assert_eq!(result.annual_income, dec!(666.90));
    }

    #[test]
    fn test_one_off_contribution_grossed_up() {
        let mut i = input();
        i.one_off_contribution = dec!(8000);
        let result = projector().calculate(&i).unwrap();
        assert_eq!(result.one_off_tax_relief, dec!(2000));
        assert_eq!(result.yearly_projection[0].opening_balance, dec!(30000));
        assert_eq!(result.total_tax_relief, dec!(2240));
    }

    #[test]
    fn test_higher_rate_reclaim_reported_not_invested() {
        let mut i = input();
        i.annual_income = dec!(80000);
        i.monthly_contribution = dec!(400);
        let result = projector().calculate(&i).unwrap();

        assert_eq!(result.annual_gross_contribution, dec!(6000));
        assert_eq!(result.annual_higher_rate_reclaim, dec!(1200));
        assert_eq!(result.net_cost, dec!(3600));
        assert_eq!(result.total_contributions, dec!(6000));
    }

    #[test]
    fn test_lump_sum_capped_by_allowance() {
        let mut i = input();
        i.current_value = dec!(2000000);
        let result = projector().calculate(&i).unwrap();
        assert_eq!(result.tax_free_lump_sum, dec!(268275));
        assert!(result.warnings.iter().any(|w| w.contains("lump sum allowance")));
    }

    #[test]
    fn test_charges_combine() {
        let mut i = input();
        i.platform_fee_pct = None;
        i.fund_charges_pct = Some(dec!(0.5));
        let result = projector().calculate(&i).unwrap();
        assert_eq!(result.total_charges_pct, dec!(0.75));
        // (20000 + 600) * 0.75%
        assert_eq!(result.total_charges, dec!(154.50));
    }

    #[test]
    fn test_retirement_must_be_after_current_age() {
        let mut i = input();
        i.retirement_age = 50;
        assert!(matches!(
            projector().calculate(&i),
            Err(CalcError::InvalidRange { field: "retirement_age", .. })
        ));
    }
}
