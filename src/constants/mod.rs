//! UK tax, National Insurance and pension constants for a tax year
//!
//! Loaded once at start-up (built-in table or CSV overrides) and never mutated.

mod tax_bands;
pub mod loader;

pub use tax_bands::{BandSpec, TaxBand, TaxSchedule};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConstantsError;

/// State Pension rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePensionConstants {
    /// Full new State Pension, per week
    pub full_weekly_rate: Decimal,
    /// Qualifying years needed for any entitlement
    pub min_qualifying_years: u32,
    /// Qualifying years needed for the full rate
    pub full_qualifying_years: u32,
    /// Voluntary Class 3 contribution, per week
    pub class3_weekly_rate: Decimal,
    /// Flat annual escalation used for projections ("triple lock")
    pub triple_lock_rate: Decimal,
    /// Years in payment used for lifetime figures
    pub years_in_payment: u32,
    /// Cap on the length of the projection series
    pub max_projection_years: u32,
    /// Only this many recent missing years can normally be bought
    pub max_purchasable_gap_years: u32,
}

/// Income tax schedules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxConstants {
    pub personal_allowance: Decimal,
    pub rest_of_uk: TaxSchedule,
    pub scottish: TaxSchedule,
}

impl IncomeTaxConstants {
    pub fn schedule(&self, scottish: bool) -> &TaxSchedule {
        if scottish {
            &self.scottish
        } else {
            &self.rest_of_uk
        }
    }
}

/// Class 1 National Insurance thresholds and rates (annual)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalInsuranceConstants {
    pub primary_threshold: Decimal,
    pub upper_earnings_limit: Decimal,
    /// Employee rate between the primary threshold and the UEL
    pub main_rate: Decimal,
    /// Employee rate above the UEL
    pub upper_rate: Decimal,
    pub secondary_threshold: Decimal,
    pub employer_rate: Decimal,
}

/// Pension allowances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceConstants {
    pub annual_allowance: Decimal,
    /// Adjusted income above which the allowance tapers
    pub taper_threshold: Decimal,
    /// Threshold income at or below which no taper applies
    pub threshold_income: Decimal,
    pub minimum_allowance: Decimal,
    pub carry_forward_years: usize,
    pub lump_sum_allowance: Decimal,
    /// Maximum tax-free share of a pot (0-1)
    pub tax_free_lump_sum_rate: Decimal,
}

/// Default projection assumptions, as 0-100 percentages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultAssumptions {
    pub growth_pct: Decimal,
    pub charges_pct: Decimal,
    pub inflation_pct: Decimal,
    pub drawdown_pct: Decimal,
    pub safe_withdrawal_pct: Decimal,
    pub high_risk_withdrawal_pct: Decimal,
}

/// Static annuity pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnuityConstants {
    /// (age, annual income per £100k) brackets, ascending by age
    pub rates_per_100k: Vec<(u32, Decimal)>,
    pub joint_life_factor: Decimal,
    pub rpi_linked_factor: Decimal,
    pub fixed_3_factor: Decimal,
    pub fixed_5_factor: Decimal,
    pub enhanced_factor: Decimal,
    pub single_life_years: u32,
    pub joint_life_years: u32,
}

/// Versioned table of every constant used by the calculators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PensionConstants {
    pub tax_year: String,
    pub state_pension: StatePensionConstants,
    pub income_tax: IncomeTaxConstants,
    pub national_insurance: NationalInsuranceConstants,
    pub allowances: AllowanceConstants,
    pub assumptions: DefaultAssumptions,
    pub annuity: AnnuityConstants,
}

impl PensionConstants {
    /// Built-in table for the 2024/25 tax year
    pub fn tax_year_2024_25() -> Self {
        let personal_allowance = dec!(12570);

        Self {
            tax_year: "2024-25".to_string(),
            state_pension: StatePensionConstants {
                full_weekly_rate: dec!(221.20),
                min_qualifying_years: 10,
                full_qualifying_years: 35,
                class3_weekly_rate: dec!(17.45),
                triple_lock_rate: dec!(0.03),
                years_in_payment: 20,
                max_projection_years: 40,
                max_purchasable_gap_years: 6,
            },
            income_tax: IncomeTaxConstants {
                personal_allowance,
                rest_of_uk: TaxSchedule::rest_of_uk(personal_allowance),
                scottish: TaxSchedule::scottish(personal_allowance),
            },
            national_insurance: NationalInsuranceConstants {
                primary_threshold: dec!(12570),
                upper_earnings_limit: dec!(50270),
                main_rate: dec!(0.08),
                upper_rate: dec!(0.02),
                secondary_threshold: dec!(9100),
                employer_rate: dec!(0.138),
            },
            allowances: AllowanceConstants {
                annual_allowance: dec!(60000),
                taper_threshold: dec!(260000),
                threshold_income: dec!(200000),
                minimum_allowance: dec!(10000),
                carry_forward_years: 3,
                lump_sum_allowance: dec!(268275),
                tax_free_lump_sum_rate: dec!(0.25),
            },
            assumptions: DefaultAssumptions {
                growth_pct: dec!(5),
                charges_pct: dec!(0.75),
                inflation_pct: dec!(2.5),
                drawdown_pct: dec!(4),
                safe_withdrawal_pct: dec!(4),
                high_risk_withdrawal_pct: dec!(6),
            },
            annuity: AnnuityConstants {
                rates_per_100k: vec![
                    (55, dec!(3500)),
                    (60, dec!(4200)),
                    (65, dec!(5500)),
                    (70, dec!(6500)),
                    (75, dec!(7500)),
                ],
                joint_life_factor: dec!(0.85),
                rpi_linked_factor: dec!(0.75),
                fixed_3_factor: dec!(0.80),
                fixed_5_factor: dec!(0.70),
                enhanced_factor: dec!(1.15),
                single_life_years: 25,
                joint_life_years: 30,
            },
        }
    }

    /// Load the built-in table with overrides from `constants.csv` (and
    /// `annuity_rates.csv` when present) in `path`
    pub fn from_csv_path(path: &Path) -> Result<Self, ConstantsError> {
        let mut constants = Self::tax_year_2024_25();
        loader::apply_overrides(&mut constants, path)?;
        Ok(constants)
    }

    /// Load from the default location (data/constants/)
    pub fn from_csv() -> Result<Self, ConstantsError> {
        Self::from_csv_path(Path::new(loader::DEFAULT_CONSTANTS_PATH))
    }
}

impl Default for PensionConstants {
    fn default() -> Self {
        Self::tax_year_2024_25()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_state_pension_annual() {
        let c = PensionConstants::tax_year_2024_25();
        assert_eq!(c.state_pension.full_weekly_rate * dec!(52), dec!(11502.40));
        assert_eq!(c.state_pension.full_qualifying_years, 35);
        assert_eq!(c.state_pension.min_qualifying_years, 10);
    }

    #[test]
    fn test_annuity_table_ascending() {
        let c = PensionConstants::default();
        let ages: Vec<u32> = c.annuity.rates_per_100k.iter().map(|(a, _)| *a).collect();
        assert!(ages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bundled_table_loads() {
        let c = PensionConstants::from_csv().unwrap();
        assert_eq!(c.tax_year, "2024-25");
        assert_eq!(c.state_pension.full_weekly_rate, dec!(221.20));
    }
}
