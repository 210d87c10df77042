//! Pension tax relief optimizer
//!
//! Compares relief at source with salary sacrifice, works out NI savings,
//! checks the annual allowance (with taper and carry-forward) and models
//! take-home pay before and after contributing.

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{check_amount, check_range, BreakdownItem, Calculator, CalculatorType, ResultSummary};
use super::income_tax::{employee_ni, employer_ni};
use crate::constants::{PensionConstants, TaxBand, TaxSchedule};
use crate::error::{CalcError, CalcResult};
use crate::money::{annualise, format_gbp, format_rate, non_negative, round_money, safe_ratio};

/// Inputs for the tax relief optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxReliefInput {
    pub annual_salary: Decimal,
    #[serde(default)]
    pub bonus: Decimal,
    /// Non-employment taxable income (rental, savings, ...)
    #[serde(default)]
    pub other_income: Decimal,
    /// Gross personal contribution per month
    pub monthly_contribution: Decimal,
    /// Employer contribution per month
    #[serde(default)]
    pub employer_contribution: Decimal,
    #[serde(default)]
    pub salary_sacrifice: bool,
    #[serde(default)]
    pub scottish_taxpayer: bool,
    /// Unused annual allowance from previous years, most recent first
    #[serde(default)]
    pub carry_forward: Vec<Decimal>,
    #[serde(default)]
    pub use_carry_forward: bool,
}

/// Tax relief analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxReliefResult {
    pub total_income: Decimal,
    pub tax_band: TaxBand,
    /// Rate of the band holding the last pound of income (0-1)
    pub marginal_tax_rate: Decimal,
    pub annual_contribution: Decimal,
    pub tax_relief_amount: Decimal,
    pub basic_rate_relief: Decimal,
    pub higher_rate_relief: Decimal,
    pub additional_rate_relief: Decimal,
    /// Relief as a share of the gross contribution (0-1)
    pub effective_relief_rate: Decimal,
    pub employee_ni_saving: Decimal,
    pub employer_ni_saving: Decimal,
    /// Gross contribution less relief and employee NI saving
    pub net_cost: Decimal,
    pub adjusted_income: Decimal,
    pub threshold_income: Decimal,
    pub taper_applied: bool,
    /// Annual allowance after any taper
    pub annual_allowance: Decimal,
    pub carry_forward_available: Decimal,
    pub annual_allowance_used: Decimal,
    pub annual_allowance_remaining: Decimal,
    /// Contributions above the available allowance
    pub allowance_excess: Decimal,
    pub take_home_before: Decimal,
    pub take_home_after: Decimal,
    pub take_home_reduction: Decimal,
    /// Further gross contribution that would still earn above-basic relief
    pub higher_rate_headroom: Decimal,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl TaxReliefResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self.tax_relief_amount)
            .with("annual_contribution", self.annual_contribution)
            .with("marginal_tax_rate", self.marginal_tax_rate)
            .with("net_cost", self.net_cost)
            .with("ni_saving", self.employee_ni_saving + self.employer_ni_saving)
            .with("annual_allowance_remaining", self.annual_allowance_remaining)
            .with("take_home_reduction", self.take_home_reduction)
            .with("total_income", self.total_income)
            .with_breakdown(&self.breakdown)
    }
}

/// Relief split by band
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ReliefSplit {
    basic: Decimal,
    higher: Decimal,
    additional: Decimal,
}

impl ReliefSplit {
    fn total(&self) -> Decimal {
        self.basic + self.higher + self.additional
    }

    fn add_extra(&mut self, band: TaxBand, amount: Decimal) {
        if band == TaxBand::Additional {
            self.additional += amount;
        } else {
            self.higher += amount;
        }
    }
}

/// Relief at source: basic rate on the whole gross contribution, plus a
/// top-up on the part of it that sits in each band above the basic rate
fn relief_at_source_split(schedule: &TaxSchedule, income: Decimal, gross: Decimal) -> ReliefSplit {
    let basic_rate = schedule.basic_rate();
    let mut split = ReliefSplit {
        basic: round_money(gross * basic_rate),
        ..Default::default()
    };

    let mut unallocated = gross;
    for band in schedule.bands().iter().rev().filter(|b| b.rate > basic_rate) {
        if unallocated.is_zero() {
            break;
        }
        let slice = band.slice_of(income).min(unallocated);
        split.add_extra(band.band, round_money(slice * (band.rate - basic_rate)));
        unallocated -= slice;
    }

    split
}

/// Relief above the basic rate that a relief-at-source saver claims back
/// through self assessment
pub fn higher_rate_reclaim(schedule: &TaxSchedule, income: Decimal, gross: Decimal) -> Decimal {
    let split = relief_at_source_split(schedule, income, gross);
    split.higher + split.additional
}

/// Salary sacrifice: the whole contribution is relieved at the marginal rate
fn salary_sacrifice_split(schedule: &TaxSchedule, income: Decimal, gross: Decimal) -> ReliefSplit {
    let basic_rate = schedule.basic_rate();
    let marginal = schedule.marginal_band(income);

    let mut split = ReliefSplit {
        basic: round_money(gross * marginal.rate.min(basic_rate)),
        ..Default::default()
    };
    if marginal.rate > basic_rate {
        split.add_extra(marginal.band, round_money(gross * (marginal.rate - basic_rate)));
    }
    split
}

/// Works out tax relief, NI savings and allowance usage for a contribution
pub struct TaxReliefOptimizer {
    constants: PensionConstants,
}

impl TaxReliefOptimizer {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            constants: constants.clone(),
        }
    }

    fn validate(&self, input: &TaxReliefInput) -> CalcResult<()> {
        check_amount("annual_salary", input.annual_salary)?;
        check_amount("bonus", input.bonus)?;
        check_amount("other_income", input.other_income)?;
        check_amount("monthly_contribution", input.monthly_contribution)?;
        check_amount("employer_contribution", input.employer_contribution)?;

        let max_years = self.constants.allowances.carry_forward_years;
        if input.carry_forward.len() > max_years {
            return Err(CalcError::OutOfRange {
                field: "carry_forward",
                value: format!("{} years", input.carry_forward.len()),
                min: "0 years".to_string(),
                max: format!("{} years", max_years),
            });
        }
        for unused in &input.carry_forward {
            check_range("carry_forward", *unused, Decimal::ZERO, self.constants.allowances.annual_allowance)?;
        }
        Ok(())
    }

    /// Tapered annual allowance for the given threshold and adjusted income
    pub fn tapered_allowance(&self, threshold_income: Decimal, adjusted_income: Decimal) -> (Decimal, bool) {
        let a = &self.constants.allowances;
        if threshold_income <= a.threshold_income || adjusted_income <= a.taper_threshold {
            return (a.annual_allowance, false);
        }
        let reduction = (adjusted_income - a.taper_threshold) / dec!(2);
        ((a.annual_allowance - reduction).max(a.minimum_allowance), true)
    }
}

impl Calculator for TaxReliefOptimizer {
    type Input = TaxReliefInput;
    type Output = TaxReliefResult;

    const KIND: CalculatorType = CalculatorType::TaxRelief;

    fn calculate(&self, input: &TaxReliefInput) -> CalcResult<TaxReliefResult> {
        self.validate(input)?;
        let schedule = self.constants.income_tax.schedule(input.scottish_taxpayer);
        let ni = &self.constants.national_insurance;

        let employment_income = input.annual_salary + input.bonus;
        let total_income = employment_income + input.other_income;
        let gross = annualise(input.monthly_contribution);
        let employer_annual = annualise(input.employer_contribution);

        let marginal = schedule.marginal_band(total_income);

        let split = if input.salary_sacrifice {
            salary_sacrifice_split(schedule, total_income, gross)
        } else {
            relief_at_source_split(schedule, total_income, gross)
        };
        let relief = split.total();

        // NI savings only arise when pay is actually sacrificed
        let sacrificed = if input.salary_sacrifice { gross.min(employment_income) } else { Decimal::ZERO };
        let employee_ni_saving =
            round_money(employee_ni(employment_income, ni) - employee_ni(employment_income - sacrificed, ni));
        let employer_ni_saving =
            round_money(employer_ni(employment_income, ni) - employer_ni(employment_income - sacrificed, ni));

        // Annual allowance
        let adjusted_income = total_income + employer_annual;
        let threshold_income = if input.salary_sacrifice { total_income } else { total_income - gross };
        let (annual_allowance, taper_applied) = self.tapered_allowance(threshold_income, adjusted_income);
        let carry_forward_available = if input.use_carry_forward {
            input.carry_forward.iter().copied().sum()
        } else {
            Decimal::ZERO
        };
        let used = gross + employer_annual;
        let available = annual_allowance + carry_forward_available;
        let remaining = non_negative(available - used);
        let excess = non_negative(used - available);

        // Take-home pay
        let take_home_before = round_money(
            total_income - schedule.income_tax(total_income) - employee_ni(employment_income, ni),
        );
        let take_home_after = if input.salary_sacrifice {
            let taxable = total_income - sacrificed;
            round_money(
                taxable - schedule.income_tax(taxable) - employee_ni(employment_income - sacrificed, ni),
            )
        } else {
            take_home_before - (gross - relief)
        };

        let higher_rate_headroom: Decimal = schedule
            .bands()
            .iter()
            .filter(|b| b.rate > schedule.basic_rate())
            .map(|b| b.slice_of(total_income))
            .sum();
        let higher_rate_headroom = non_negative(higher_rate_headroom - gross);

        let mut warnings = Vec::new();
        if gross > employment_income && gross > dec!(3600) {
            warnings.push(format!(
                "Tax relief is limited to contributions of 100% of your earnings ({}).",
                format_gbp(employment_income)
            ));
        }
        if excess > Decimal::ZERO {
            warnings.push(format!(
                "Contributions exceed your available annual allowance by {}; an annual allowance charge may apply.",
                format_gbp(excess)
            ));
        }
        if taper_applied {
            warnings.push(format!(
                "Your annual allowance is tapered to {} because of your income.",
                format_gbp(annual_allowance)
            ));
        }
        if total_income > dec!(100000) {
            warnings.push(
                "Income over £100,000 reduces your personal allowance; contributions can restore it.".to_string(),
            );
        }

        let breakdown = vec![
            BreakdownItem::new("Gross contribution", gross),
            BreakdownItem::new("Basic rate relief", split.basic),
            BreakdownItem::new("Higher rate relief", split.higher),
            BreakdownItem::new("Additional rate relief", split.additional),
            BreakdownItem::new("Employee NI saving", employee_ni_saving),
            BreakdownItem::new("Employer NI saving", employer_ni_saving),
            BreakdownItem::new("Net cost to you", round_money(gross - relief - employee_ni_saving)),
        ];

        let assumptions = vec![
            format!(
                "{} income tax bands for {}",
                if input.scottish_taxpayer { "Scottish" } else { "UK" },
                self.constants.tax_year
            ),
            format!("Marginal rate of {}", format_rate(marginal.rate)),
            format!(
                "Annual allowance of {}, tapered above adjusted income of {}",
                format_gbp(self.constants.allowances.annual_allowance),
                format_gbp(self.constants.allowances.taper_threshold)
            ),
            if input.salary_sacrifice {
                "Contributions made by salary sacrifice before tax and NI".to_string()
            } else {
                "Basic rate relief added at source, higher rate relief claimed back".to_string()
            },
        ];

        debug!(
            "tax relief: income {} band {:?} gross {} relief {}",
            total_income, marginal.band, gross, relief
        );

        Ok(TaxReliefResult {
            total_income,
            tax_band: marginal.band,
            marginal_tax_rate: marginal.rate,
            annual_contribution: gross,
            tax_relief_amount: relief,
            basic_rate_relief: split.basic,
            higher_rate_relief: split.higher,
            additional_rate_relief: split.additional,
            effective_relief_rate: safe_ratio(relief, gross).round_dp(4),
            employee_ni_saving,
            employer_ni_saving,
            net_cost: round_money(gross - relief - employee_ni_saving),
            adjusted_income,
            threshold_income,
            taper_applied,
            annual_allowance,
            carry_forward_available,
            annual_allowance_used: used,
            annual_allowance_remaining: remaining,
            allowance_excess: excess,
            take_home_before,
            take_home_after,
            take_home_reduction: take_home_before - take_home_after,
            higher_rate_headroom,
            breakdown,
            warnings,
            assumptions,
        })
    }
}
