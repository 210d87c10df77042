//! Annuity income estimator over a static rate table

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{check_age, check_amount, BreakdownItem, Calculator, CalculatorType, ResultSummary};
use crate::constants::{AnnuityConstants, PensionConstants};
use crate::error::{CalcError, CalcResult};
use crate::money::{format_gbp, pct, round_money, safe_ratio};

const RATE_BASIS: Decimal = dec!(100000);

/// How the income rises once in payment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    #[default]
    Level,
    RpiLinked,
    #[serde(rename = "fixed_3")]
    Fixed3,
    #[serde(rename = "fixed_5")]
    Fixed5,
}

impl Escalation {
    fn factor(&self, rates: &AnnuityConstants) -> Decimal {
        match self {
            Escalation::Level => Decimal::ONE,
            Escalation::RpiLinked => rates.rpi_linked_factor,
            Escalation::Fixed3 => rates.fixed_3_factor,
            Escalation::Fixed5 => rates.fixed_5_factor,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Escalation::Level => "level",
            Escalation::RpiLinked => "RPI-linked",
            Escalation::Fixed3 => "3% escalating",
            Escalation::Fixed5 => "5% escalating",
        }
    }
}

fn default_take_lump_sum() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnuityInput {
    pub pot_value: Decimal,
    /// Age at purchase
    pub age: u32,
    #[serde(default)]
    pub joint_life: bool,
    #[serde(default)]
    pub escalation: Escalation,
    #[serde(default)]
    pub health_enhanced: bool,
    /// Take 25% tax-free before buying the annuity
    #[serde(default = "default_take_lump_sum")]
    pub take_tax_free_lump_sum: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnuityResult {
    /// Table income per £100k for the nearest age bracket
    pub base_rate_per_100k: Decimal,
    /// After joint life, escalation and health adjustments
    pub adjusted_rate_per_100k: Decimal,
    pub tax_free_lump_sum: Decimal,
    pub purchase_amount: Decimal,
    pub annual_income_with_lump_sum: Decimal,
    pub annual_income_without_lump_sum: Decimal,
    /// Income for the option chosen in the input
    pub annual_income: Decimal,
    pub monthly_income: Decimal,
    pub life_years: u32,
    pub lifetime_income: Decimal,
    /// Years of income needed to get the purchase price back
    pub payback_years: Decimal,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl AnnuityResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self.annual_income)
            .with("monthly_income", self.monthly_income)
            .with("annual_income_with_lump_sum", self.annual_income_with_lump_sum)
            .with("annual_income_without_lump_sum", self.annual_income_without_lump_sum)
            .with("tax_free_lump_sum", self.tax_free_lump_sum)
            .with("lifetime_income", self.lifetime_income)
            .with("pot_value", self.purchase_amount + self.tax_free_lump_sum)
            .with_breakdown(&self.breakdown)
    }
}

/// Table rate for the bracket closest to `age` (ties go to the younger bracket)
pub fn nearest_bracket_rate(rates: &[(u32, Decimal)], age: u32) -> Option<Decimal> {
    rates
        .iter()
        .min_by_key(|(bracket, _)| bracket.abs_diff(age))
        .map(|(_, rate)| *rate)
}

pub struct AnnuityEstimator {
    constants: PensionConstants,
}

impl AnnuityEstimator {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            constants: constants.clone(),
        }
    }

    /// Yearly income increase used for the lifetime total
    fn escalation_rate(&self, escalation: Escalation) -> Decimal {
        match escalation {
            Escalation::Level => Decimal::ZERO,
            Escalation::RpiLinked => pct(self.constants.assumptions.inflation_pct),
            Escalation::Fixed3 => dec!(0.03),
            Escalation::Fixed5 => dec!(0.05),
        }
    }
}

impl Calculator for AnnuityEstimator {
    type Input = AnnuityInput;
    type Output = AnnuityResult;

    const KIND: CalculatorType = CalculatorType::Annuity;

    fn calculate(&self, input: &AnnuityInput) -> CalcResult<AnnuityResult> {
        check_amount("pot_value", input.pot_value)?;
        check_age("age", input.age)?;

        let rates = &self.constants.annuity;
        let base = nearest_bracket_rate(&rates.rates_per_100k, input.age)
            .ok_or(CalcError::MissingConstant("annuity rate table"))?;

        let mut adjusted = base * input.escalation.factor(rates);
        if input.joint_life {
            adjusted *= rates.joint_life_factor;
        }
        if input.health_enhanced {
            adjusted *= rates.enhanced_factor;
        }
        let rate = adjusted / RATE_BASIS;

        let lump_sum = round_money(input.pot_value * self.constants.allowances.tax_free_lump_sum_rate);
        let with_lump = round_money((input.pot_value - lump_sum) * rate);
        let without_lump = round_money(input.pot_value * rate);

        let (annual_income, purchase_amount, tax_free_lump_sum) = if input.take_tax_free_lump_sum {
            (with_lump, input.pot_value - lump_sum, lump_sum)
        } else {
            (without_lump, input.pot_value, Decimal::ZERO)
        };

        let life_years = if input.joint_life {
            rates.joint_life_years
        } else {
            rates.single_life_years
        };
        let growth = Decimal::ONE + self.escalation_rate(input.escalation);
        let mut payment = annual_income;
        let mut lifetime = Decimal::ZERO;
        for _ in 0..life_years {
            lifetime += payment;
            payment *= growth;
        }
        let lifetime_income = round_money(lifetime);
        let payback_years = safe_ratio(purchase_amount, annual_income).round_dp(1);

        let mut warnings = Vec::new();
        if input.age < 55 {
            warnings.push("Pension benefits cannot normally be taken before age 55.".to_string());
        }
        if input.escalation != Escalation::Level {
            warnings.push(format!(
                "A {} annuity starts lower than a level one and takes longer to catch up.",
                input.escalation.label()
            ));
        }
        if input.pot_value < dec!(10000) {
            warnings.push("Small pots may be better taken as cash than used to buy an annuity.".to_string());
        }

        let breakdown = vec![
            BreakdownItem::new("Pot value", input.pot_value),
            BreakdownItem::new("Tax-free lump sum", tax_free_lump_sum),
            BreakdownItem::new("Used to buy annuity", purchase_amount),
            BreakdownItem::new("Annual income", annual_income),
            BreakdownItem::new("Estimated lifetime income", lifetime_income),
        ];

        let assumptions = vec![
            format!("Illustrative rate of {} a year per £100,000 at age {}", format_gbp(adjusted), input.age),
            format!(
                "{} life, {} income{}",
                if input.joint_life { "Joint" } else { "Single" },
                input.escalation.label(),
                if input.health_enhanced { ", enhanced for health" } else { "" }
            ),
            format!("Income paid for {} years", life_years),
            "Rates are static estimates, not live quotes".to_string(),
        ];

        debug!("annuity: age {} pot {} income {}", input.age, input.pot_value, annual_income);

        Ok(AnnuityResult {
            base_rate_per_100k: base,
            adjusted_rate_per_100k: adjusted,
            tax_free_lump_sum,
            purchase_amount,
            annual_income_with_lump_sum: with_lump,
            annual_income_without_lump_sum: without_lump,
            annual_income,
            monthly_income: round_money(annual_income / dec!(12)),
            life_years,
            lifetime_income,
            payback_years,
            breakdown,
            warnings,
            assumptions,
        })
    }
}
