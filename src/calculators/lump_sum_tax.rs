//! Tax on a lump sum taken from a pension pot

use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::common::{check_amount, BreakdownItem, Calculator, CalculatorType, ResultSummary};
use super::income_tax::tax_on_top_slice;
use crate::constants::{PensionConstants, TaxBand};
use crate::error::{CalcError, CalcResult};
use crate::money::{format_gbp, non_negative, round_money, safe_ratio};

/// How the tax-free part of a withdrawal is worked out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMethod {
    /// Take the pot's whole tax-free entitlement first
    TaxFreeCashFirst,
    /// Uncrystallised funds pension lump sum: a quarter of each payment is tax-free
    #[default]
    Ufpls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LumpSumTaxInput {
    pub pot_value: Decimal,
    pub withdrawal_amount: Decimal,
    /// Other taxable income in the same tax year
    #[serde(default)]
    pub other_income: Decimal,
    #[serde(default)]
    pub method: WithdrawalMethod,
    #[serde(default)]
    pub scottish_taxpayer: bool,
    /// Lump sum allowance already used by earlier withdrawals
    #[serde(default)]
    pub lump_sum_allowance_used: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LumpSumTaxResult {
    pub tax_free_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_due: Decimal,
    pub net_amount: Decimal,
    /// Tax as a share of the whole withdrawal (0-1)
    pub effective_tax_rate: Decimal,
    pub tax_band: TaxBand,
    /// Tax deducted on a month-1 emergency code
    pub emergency_tax: Decimal,
    /// Emergency tax above the tax actually due, reclaimable from HMRC
    pub potential_overpayment: Decimal,
    pub remaining_pot: Decimal,
    pub lump_sum_allowance_remaining: Decimal,
    /// Taking taxable income limits future contributions to the money purchase annual allowance
    pub mpaa_triggered: bool,
    pub breakdown: Vec<BreakdownItem>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

impl LumpSumTaxResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::new(self.tax_due)
            .with("net_amount", self.net_amount)
            .with("tax_free_amount", self.tax_free_amount)
            .with("effective_tax_rate", self.effective_tax_rate)
            .with("emergency_tax", self.emergency_tax)
            .with("remaining_pot", self.remaining_pot)
            .with_breakdown(&self.breakdown)
    }
}

/// Money purchase annual allowance once flexible income has been taken
const MONEY_PURCHASE_ANNUAL_ALLOWANCE: Decimal = dec!(10000);

pub struct LumpSumTaxEstimator {
    constants: PensionConstants,
}

impl LumpSumTaxEstimator {
    pub fn new(constants: &PensionConstants) -> Self {
        Self {
            constants: constants.clone(),
        }
    }

    fn validate(&self, input: &LumpSumTaxInput) -> CalcResult<()> {
        check_amount("pot_value", input.pot_value)?;
        check_amount("withdrawal_amount", input.withdrawal_amount)?;
        check_amount("other_income", input.other_income)?;
        check_amount("lump_sum_allowance_used", input.lump_sum_allowance_used)?;
        if input.withdrawal_amount > input.pot_value {
            return Err(CalcError::InvalidRange {
                field: "withdrawal_amount",
                reason: format!(
                    "withdrawal {} is larger than the pot {}",
                    input.withdrawal_amount, input.pot_value
                ),
            });
        }
        Ok(())
    }
}

impl Calculator for LumpSumTaxEstimator {
    type Input = LumpSumTaxInput;
    type Output = LumpSumTaxResult;

    const KIND: CalculatorType = CalculatorType::LumpSumTax;

    fn calculate(&self, input: &LumpSumTaxInput) -> CalcResult<LumpSumTaxResult> {
        self.validate(input)?;
        let allowances = &self.constants.allowances;
        let schedule = self.constants.income_tax.schedule(input.scottish_taxpayer);

        let lsa_left = non_negative(allowances.lump_sum_allowance - input.lump_sum_allowance_used);
        let entitlement = match input.method {
            WithdrawalMethod::TaxFreeCashFirst => input.pot_value * allowances.tax_free_lump_sum_rate,
            WithdrawalMethod::Ufpls => input.withdrawal_amount * allowances.tax_free_lump_sum_rate,
        };
        let tax_free_amount = round_money(entitlement.min(input.withdrawal_amount).min(lsa_left));
        let taxable_amount = input.withdrawal_amount - tax_free_amount;

        let tax_due = round_money(tax_on_top_slice(schedule, input.other_income, taxable_amount));
        let net_amount = input.withdrawal_amount - tax_due;
        let tax_band = schedule.marginal_band(input.other_income + taxable_amount).band;

        // Month 1 basis: the payment is taxed as if it were paid every month
        let emergency_tax = round_money(schedule.income_tax(taxable_amount * dec!(12)) / dec!(12));
        let potential_overpayment = non_negative(emergency_tax - tax_due);

        let mpaa_triggered = taxable_amount > Decimal::ZERO;
        let remaining_pot = input.pot_value - input.withdrawal_amount;

        let mut warnings = Vec::new();
        if potential_overpayment > Decimal::ZERO {
            warnings.push(format!(
                "Emergency tax could take {} more than is due; you can reclaim it from HMRC.",
                format_gbp(potential_overpayment)
            ));
        }
        if mpaa_triggered {
            warnings.push(format!(
                "Taking taxable income reduces your future annual allowance to {}.",
                format_gbp(MONEY_PURCHASE_ANNUAL_ALLOWANCE)
            ));
        }
        if entitlement.min(input.withdrawal_amount) > lsa_left {
            warnings.push(format!(
                "Tax-free cash is limited by the lump sum allowance of {}.",
                format_gbp(allowances.lump_sum_allowance)
            ));
        }
        if tax_band >= TaxBand::Higher && schedule.marginal_band(input.other_income).band < TaxBand::Higher {
            warnings.push("This withdrawal pushes part of your income into a higher tax band.".to_string());
        }

        let breakdown = vec![
            BreakdownItem::new("Withdrawal", input.withdrawal_amount),
            BreakdownItem::new("Tax-free", tax_free_amount),
            BreakdownItem::new("Taxable", taxable_amount),
            BreakdownItem::new("Income tax", -tax_due),
            BreakdownItem::new("You receive", net_amount),
        ];

        let assumptions = vec![
            format!(
                "{} income tax bands for {}",
                if input.scottish_taxpayer { "Scottish" } else { "UK" },
                self.constants.tax_year
            ),
            format!("Other taxable income of {}", format_gbp(input.other_income)),
            match input.method {
                WithdrawalMethod::TaxFreeCashFirst => "Tax-free cash of up to 25% of the pot taken first".to_string(),
                WithdrawalMethod::Ufpls => "25% of the withdrawal is tax-free".to_string(),
            },
        ];

        debug!(
            "lump sum tax: withdrawal {} taxable {} tax {}",
            input.withdrawal_amount, taxable_amount, tax_due
        );

        Ok(LumpSumTaxResult {
            tax_free_amount,
            taxable_amount,
            tax_due,
            net_amount,
            effective_tax_rate: safe_ratio(tax_due, input.withdrawal_amount).round_dp(4),
            tax_band,
            emergency_tax,
            potential_overpayment,
            remaining_pot,
            lump_sum_allowance_remaining: lsa_left - tax_free_amount,
            mpaa_triggered,
            breakdown,
            warnings,
            assumptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> LumpSumTaxEstimator {
        LumpSumTaxEstimator::new(&PensionConstants::default())
    }

    fn input(method: WithdrawalMethod, withdrawal: Decimal) -> LumpSumTaxInput {
        LumpSumTaxInput {
            pot_value: dec!(100000),
            withdrawal_amount: withdrawal,
            other_income: dec!(30000),
            method,
            scottish_taxpayer: false,
            lump_sum_allowance_used: Decimal::ZERO,
        }
    }

    #[test]
    fn test_ufpls_quarter_tax_free() {
        let result = estimator().calculate(&input(WithdrawalMethod::Ufpls, dec!(20000))).unwrap();

        assert_eq!(result.tax_free_amount, dec!(5000));
        assert_eq!(result.taxable_amount, dec!(15000));
        assert_eq!(result.tax_due, dec!(3000));
        assert_eq!(result.net_amount, dec!(17000));
        assert_eq!(result.effective_tax_rate, dec!(0.15));
        assert_eq!(result.tax_band, TaxBand::Basic);
        assert!(result.mpaa_triggered);
    }

    #[test]
    fn test_emergency_tax_overpayment() {
        let result = estimator().calculate(&input(WithdrawalMethod::Ufpls, dec!(20000))).unwrap();
        // 180000 a year taxed across all bands, divided by 12
        assert_eq!(result.emergency_tax, dec!(5181.25));
        assert_eq!(result.potential_overpayment, dec!(2181.25));
    }

    #[test]
    fn test_tax_free_cash_first() {
        let result = estimator()
            .calculate(&input(WithdrawalMethod::TaxFreeCashFirst, dec!(20000)))
            .unwrap();
        assert_eq!(result.tax_free_amount, dec!(20000));
        assert_eq!(result.tax_due, Decimal::ZERO);
        assert!(!result.mpaa_triggered);

        let result = estimator()
            .calculate(&input(WithdrawalMethod::TaxFreeCashFirst, dec!(40000)))
            .unwrap();
        assert_eq!(result.tax_free_amount, dec!(25000));
        assert_eq!(result.tax_due, dec!(3000));
    }

    #[test]
    fn test_lump_sum_allowance_caps_tax_free() {
        let mut i = input(WithdrawalMethod::TaxFreeCashFirst, dec!(1000000));
        i.pot_value = dec!(2000000);
        let result = estimator().calculate(&i).unwrap();
        assert_eq!(result.tax_free_amount, dec!(268275));
        assert_eq!(result.lump_sum_allowance_remaining, Decimal::ZERO);
        assert!(result.warnings.iter().any(|w| w.contains("lump sum allowance")));
    }

    #[test]
    fn test_withdrawal_larger_than_pot() {
        let err = estimator()
            .calculate(&input(WithdrawalMethod::Ufpls, dec!(100001)))
            .unwrap_err();
        assert!(matches!(err, CalcError::InvalidRange { field: "withdrawal_amount", .. }));
    }

    #[test]
    fn test_zero_withdrawal() {
        let result = estimator().calculate(&input(WithdrawalMethod::Ufpls, Decimal::ZERO)).unwrap();
        assert_eq!(result.effective_tax_rate, Decimal::ZERO);
        assert_eq!(result.tax_due, Decimal::ZERO);
    }
}
