//! Drawdown sustainability simulator
//!
//! Two phases run in real (inflation-adjusted) terms: accumulation until
//! retirement, then a level annual withdrawal taken at the start of each
//! year with the remainder growing, until the pot runs out or life
//! expectancy is reached.

use log::debug;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{
    check_age, check_amount, check_charges_pct, check_growth_pct, check_inflation_pct, check_range,
    check_range_u32, BreakdownItem, Calculator, CalculatorType, ResultSummary,
};
use crate::constants::PensionConstants;
use crate::error::{CalcError, CalcResult};
use crate::money::{annualise, format_gbp, format_rate, pct, round_money, safe_ratio};

/// Oldest life expectancy accepted
pub const MAX_LIFE_EXPECTANCY: u32 = 120;

/// Inputs for a drawdown simulation. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownInput {
    pub current_age: u32,
    /// May equal `current_age` for someone already retiring
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub current_pot: Decimal,
    #[serde(default)]
    pub monthly_contribution: Decimal,
    /// Income taken from the pot each year, in today's money
    pub annual_withdrawal: Decimal,
    #[serde(default)]
    pub annual_growth_pct: Option<Decimal>,
    #[serde(default)]
    pub annual_charges_pct: Option<Decimal>,
    #[serde(default)]
    pub inflation_pct: Option<Decimal>,
    /// Tax-free lump sum taken at retirement; capped at 25%
    #[serde(default)]
    pub lump_sum_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Accumulation,
    Drawdown,
}

/// One simulated year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownYear {
    pub year: u32,
    /// Age at the end of the year
    pub age: u32,
    pub phase: Phase,
    pub opening_balance: Decimal,
    pub contributions: Decimal,
    pub withdrawal: Decimal,
    pub growth: Decimal,
    pub closing_balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sustainability {
    /// The pot pays the full withdrawal every year to life expectancy
    Sustainable,
    AtRisk,
}

impl Sustainability {
    pub fn label(&self) -> &'static str {
        match self {
            Sustainability::Sustainable => "Sustainable",
            Sustainability::AtRisk => "At Risk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Drawdown simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownResult {
    pub pot_at_retirement: Decimal,
    pub tax_free_lump_sum: Decimal,
    pub pot_after_lump_sum: Decimal,
    /// Withdrawal as a share of the pot after the lump sum (0-1)
    pub withdrawal_rate: Decimal,
    /// growth - charges - inflation (0-1)
    pub net_real_growth_rate: Decimal,
    pub status: Sustainability,
    pub high_risk: bool,
    pub risk_level: RiskLevel,
    pub depletion_year: Option<u32>,
    pub depletion_age: Option<u32>,
    /// Years of drawdown actually simulated
    pub years_lasted: u32,
    pub final_balance: Decimal,
    pub total_withdrawn: Decimal,
    /// Level withdrawal that exhausts the pot exactly at life expectancy
    pub sustainable_withdrawal: Decimal,
    pub yearly_projection: Vec<DrawdownYear>,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl DrawdownResult {
    pub fn summary(&self) -> ResultSummary {
        let mut summary = ResultSummary::new(self.pot_after_lump_sum)
            .with("pot_at_retirement", self.pot_at_retirement)
            .with("withdrawal_rate", self.withdrawal_rate)
            .with("sustainable_withdrawal", self.sustainable_withdrawal)
            .with("total_withdrawn", self.total_withdrawn)
            .with("final_balance", self.final_balance)
            .with("tax_free_lump_sum", self.tax_free_lump_sum)
            .with("years_lasted", Decimal::from(self.years_lasted))
            .with_breakdown(&self.breakdown);
        if let Some(age) = self.depletion_age {
            summary = summary.with("depletion_age", Decimal::from(age));
        }
        summary
    }
}

/// Level withdrawal, taken at the start of each of `years` years, that
/// leaves nothing after the last one: `P(1+r)^n / sum_{j=1..n} (1+r)^j`
pub fn sustainable_withdrawal(pot: Decimal, real_rate: Decimal, years: u32) -> Decimal {
    if years == 0 {
        return Decimal::ZERO;
    }
    let factor = Decimal::ONE + real_rate;
    let mut annuity_factor = Decimal::ZERO;
    let mut compounded = Decimal::ONE;
    for _ in 0..years {
        compounded *= factor;
        annuity_factor += compounded;
    }
    round_money(safe_ratio(pot * factor.powu(u64::from(years)), annuity_factor))
}

/// Simulates whether a level withdrawal lasts to life expectancy
pub struct DrawdownSimulator {
    constants: PensionConstants,
}

impl DrawdownSimulator {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            constants: constants.clone(),
        }
    }

    fn validate(&self, input: &DrawdownInput) -> CalcResult<()> {
        check_age("current_age", input.current_age)?;
        check_age("retirement_age", input.retirement_age)?;
        if input.retirement_age < input.current_age {
            return Err(CalcError::InvalidRange {
                field: "retirement_age",
                reason: format!(
                    "retirement age {} must not be before current age {}",
                    input.retirement_age, input.current_age
                ),
            });
        }
        check_range_u32("life_expectancy", input.life_expectancy, 16, MAX_LIFE_EXPECTANCY)?;
        if input.life_expectancy <= input.retirement_age {
            return Err(CalcError::InvalidRange {
                field: "life_expectancy",
                reason: format!(
                    "life expectancy {} must be greater than retirement age {}",
                    input.life_expectancy, input.retirement_age
                ),
            });
        }
        check_amount("current_pot", input.current_pot)?;
        check_amount("monthly_contribution", input.monthly_contribution)?;
        check_amount("annual_withdrawal", input.annual_withdrawal)?;
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
        Ok(())
    }

    fn risk_level(&self, withdrawal_rate: Decimal) -> RiskLevel {
        let a = &self.constants.assumptions;
        if withdrawal_rate <= pct(a.safe_withdrawal_pct) {
            RiskLevel::Low
        } else if withdrawal_rate <= pct(a.high_risk_withdrawal_pct) {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl Calculator for DrawdownSimulator {
    type Input = DrawdownInput;
    type Output = DrawdownResult;

    const KIND: CalculatorType = CalculatorType::PensionDrawdown;

    fn calculate(&self, input: &DrawdownInput) -> CalcResult<DrawdownResult> {
        self.validate(input)?;
        let defaults = &self.constants.assumptions;

        let growth_pct = input.annual_growth_pct.unwrap_or(defaults.growth_pct);
        let charges_pct = input.annual_charges_pct.unwrap_or(defaults.charges_pct);
        let inflation_pct = input.inflation_pct.unwrap_or(defaults.inflation_pct);
        let real_rate = pct(growth_pct - charges_pct - inflation_pct);

        let mut rows = Vec::new();
        let mut balance = input.current_pot;
        let mut year = 0;

        // Accumulation
        let contributions = annualise(input.monthly_contribution);
        for age in input.current_age..input.retirement_age {
            year += 1;
            let growth = round_money((balance + contributions) * real_rate);
            let closing = balance + contributions + growth;
            rows.push(DrawdownYear {
                year,
                age: age + 1,
                phase: Phase::Accumulation,
                opening_balance: balance,
                contributions,
                withdrawal: Decimal::ZERO,
                growth,
                closing_balance: closing,
            });
            balance = closing;
        }

        let pot_at_retirement = balance;
        let max_lump_pct = (self.constants.allowances.tax_free_lump_sum_rate * Decimal::ONE_HUNDRED).normalize();
        let lump_pct = input.lump_sum_pct.unwrap_or(max_lump_pct).min(max_lump_pct);
        let tax_free_lump_sum = round_money(pot_at_retirement * pct(lump_pct));
        let pot_after_lump_sum = pot_at_retirement - tax_free_lump_sum;
        balance = pot_after_lump_sum;

        let withdrawal_rate = safe_ratio(input.annual_withdrawal, pot_after_lump_sum).round_dp(4);
        let drawdown_years = input.life_expectancy - input.retirement_age;

        // Drawdown
        let wanted = input.annual_withdrawal;
        let mut depletion_year = None;
        let mut total_withdrawn = Decimal::ZERO;
        for n in 1..=drawdown_years {
            year += 1;
            let withdrawal = wanted.min(balance);
            let remainder = balance - withdrawal;
            let growth = round_money(remainder * real_rate);
            let closing = remainder + growth;
            rows.push(DrawdownYear {
                year,
                age: input.retirement_age + n,
                phase: Phase::Drawdown,
                opening_balance: balance,
                contributions: Decimal::ZERO,
                withdrawal,
                growth,
                closing_balance: closing,
            });
            total_withdrawn += withdrawal;
            balance = closing;

            let short_paid = withdrawal < wanted;
            let exhausted_early = closing <= Decimal::ZERO && n < drawdown_years;
            if wanted > Decimal::ZERO && (short_paid || exhausted_early) {
                depletion_year = Some(n);
                break;
            }
        }

        let depletion_age = depletion_year.map(|n| input.retirement_age + n);
        let status = if depletion_year.is_some() {
            Sustainability::AtRisk
        } else {
            Sustainability::Sustainable
        };
        let high_risk = withdrawal_rate > pct(defaults.high_risk_withdrawal_pct);
        let risk_level = self.risk_level(withdrawal_rate);
        let years_lasted = depletion_year.unwrap_or(drawdown_years);
        let sustainable = sustainable_withdrawal(pot_after_lump_sum, real_rate, drawdown_years);

        let mut warnings = Vec::new();
        if let Some(age) = depletion_age {
            warnings.push(format!(
                "At {} a year your pot runs out at age {}, before age {}.",
                format_gbp(wanted),
                age,
                input.life_expectancy
            ));
        }
        if high_risk {
            warnings.push(format!(
                "A withdrawal rate of {} is above {}% and is high risk.",
                format_rate(withdrawal_rate),
                defaults.high_risk_withdrawal_pct
            ));
        } else if risk_level == RiskLevel::Medium {
            warnings.push(format!(
                "A withdrawal rate of {} is above the {}% commonly treated as sustainable.",
                format_rate(withdrawal_rate),
                defaults.safe_withdrawal_pct
            ));
        }
        if real_rate < Decimal::ZERO {
            warnings.push("Charges and inflation exceed growth: the pot shrinks in real terms.".to_string());
        }

        let breakdown = vec![
            BreakdownItem::new("Pot at retirement", pot_at_retirement),
            BreakdownItem::new("Tax-free lump sum", tax_free_lump_sum),
            BreakdownItem::new("Pot for drawdown", pot_after_lump_sum),
            BreakdownItem::new("Total withdrawn", total_withdrawn),
            BreakdownItem::new("Remaining at end", balance),
        ];

        let assumptions = vec![
            format!(
                "Net real growth of {} a year ({}% growth, {}% charges, {}% inflation)",
                format_rate(real_rate),
                growth_pct,
                charges_pct,
                inflation_pct
            ),
            "Figures are in today's money".to_string(),
            "Withdrawals taken at the start of each year".to_string(),
            format!("Income needed until age {}", input.life_expectancy),
        ];

        debug!(
            "drawdown: pot {} withdrawal {} rate {} depleted {:?}",
            pot_after_lump_sum, wanted, withdrawal_rate, depletion_age
        );

        Ok(DrawdownResult {
            pot_at_retirement,
            tax_free_lump_sum,
            pot_after_lump_sum,
            withdrawal_rate,
            net_real_growth_rate: real_rate,
            status,
            high_risk,
            risk_level,
            depletion_year,
            depletion_age,
            years_lasted,
            final_balance: balance,
            total_withdrawn,
            sustainable_withdrawal: sustainable,
            yearly_projection: rows,
            breakdown,
            warnings,
            assumptions,
        })
    }
}
