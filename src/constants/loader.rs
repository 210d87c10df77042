//! CSV-based constants loader
//!
//! Reads `key,value` overrides from constants.csv and an optional
//! `age,rate_per_100k` annuity table from annuity_rates.csv.

use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use super::{PensionConstants, TaxSchedule};
use crate::error::ConstantsError;

/// Default path to the constants directory
pub const DEFAULT_CONSTANTS_PATH: &str = "data/constants";

/// Load `key,value` rows from constants.csv
pub fn load_overrides(path: &Path) -> Result<HashMap<String, String>, ConstantsError> {
    let file = File::open(path.join("constants.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut overrides = HashMap::new();
    for result in reader.records() {
        let record = result?;
        let key = record.get(0).unwrap_or_default().trim().to_string();
        let value = record.get(1).unwrap_or_default().trim().to_string();
        if !key.is_empty() {
            overrides.insert(key, value);
        }
    }

    Ok(overrides)
}

/// Load the annuity rate table from annuity_rates.csv, sorted by age
pub fn load_annuity_rates(path: &Path) -> Result<Vec<(u32, Decimal)>, ConstantsError> {
    let file = File::open(path.join("annuity_rates.csv"))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rates = Vec::new();
    for result in reader.records() {
        let record = result?;
        let age_text = record.get(0).unwrap_or_default().trim();
        let rate_text = record.get(1).unwrap_or_default().trim();
        let age = age_text.parse::<u32>().map_err(|_| ConstantsError::InvalidValue {
            key: "annuity_rates.age".to_string(),
            value: age_text.to_string(),
        })?;
        rates.push((age, parse_decimal("annuity_rates.rate_per_100k", rate_text)?));
    }

    rates.sort_by_key(|(age, _)| *age);
    Ok(rates)
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConstantsError> {
    Decimal::from_str(value).map_err(|_| ConstantsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_count(key: &str, value: &str) -> Result<u32, ConstantsError> {
    value.parse::<u32>().map_err(|_| ConstantsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Apply every override found in `path` to `constants`
pub fn apply_overrides(constants: &mut PensionConstants, path: &Path) -> Result<(), ConstantsError> {
    let overrides = load_overrides(path)?;
    let mut allowance_changed = false;

    for (key, value) in &overrides {
        let v = value.as_str();
        match key.as_str() {
            "tax_year" => constants.tax_year = value.clone(),
            "state_pension.full_weekly_rate" => {
                constants.state_pension.full_weekly_rate = parse_decimal(key, v)?
            }
            "state_pension.class3_weekly_rate" => {
                constants.state_pension.class3_weekly_rate = parse_decimal(key, v)?
            }
            "state_pension.triple_lock_rate" => {
                constants.state_pension.triple_lock_rate = parse_decimal(key, v)?
            }
            "state_pension.full_qualifying_years" => {
                constants.state_pension.full_qualifying_years = parse_count(key, v)?
            }
            "state_pension.min_qualifying_years" => {
                constants.state_pension.min_qualifying_years = parse_count(key, v)?
            }
            "income_tax.personal_allowance" => {
                constants.income_tax.personal_allowance = parse_decimal(key, v)?;
                allowance_changed = true;
            }
            "ni.primary_threshold" => constants.national_insurance.primary_threshold = parse_decimal(key, v)?,
            "ni.upper_earnings_limit" => constants.national_insurance.upper_earnings_limit = parse_decimal(key, v)?,
            "ni.main_rate" => constants.national_insurance.main_rate = parse_decimal(key, v)?,
            "ni.upper_rate" => constants.national_insurance.upper_rate = parse_decimal(key, v)?,
            "ni.secondary_threshold" => constants.national_insurance.secondary_threshold = parse_decimal(key, v)?,
            "ni.employer_rate" => constants.national_insurance.employer_rate = parse_decimal(key, v)?,
            "allowance.annual" => constants.allowances.annual_allowance = parse_decimal(key, v)?,
            "allowance.taper_threshold" => constants.allowances.taper_threshold = parse_decimal(key, v)?,
            "allowance.threshold_income" => constants.allowances.threshold_income = parse_decimal(key, v)?,
            "allowance.minimum" => constants.allowances.minimum_allowance = parse_decimal(key, v)?,
            "allowance.lump_sum" => constants.allowances.lump_sum_allowance = parse_decimal(key, v)?,
            "assumptions.growth_pct" => constants.assumptions.growth_pct = parse_decimal(key, v)?,
            "assumptions.charges_pct" => constants.assumptions.charges_pct = parse_decimal(key, v)?,
            "assumptions.inflation_pct" => constants.assumptions.inflation_pct = parse_decimal(key, v)?,
            "assumptions.drawdown_pct" => constants.assumptions.drawdown_pct = parse_decimal(key, v)?,
            other => return Err(ConstantsError::UnknownKey(other.to_string())),
        }
        debug!("constants override {} = {}", key, value);
    }

    if allowance_changed {
        let pa = constants.income_tax.personal_allowance;
        constants.income_tax.rest_of_uk = TaxSchedule::rest_of_uk(pa);
        constants.income_tax.scottish = TaxSchedule::scottish(pa);
    }

    let annuity_path = path.join("annuity_rates.csv");
    if annuity_path.exists() {
        constants.annuity.rates_per_100k = load_annuity_rates(path)?;
    }

    validate(constants)?;

    info!(
        "Loaded pension constants for {} ({} overrides) from {}",
        constants.tax_year,
        overrides.len(),
        path.display()
    );
    Ok(())
}

fn check(ok: bool, key: &str, value: impl ToString) -> Result<(), ConstantsError> {
    if ok {
        Ok(())
    } else {
        Err(ConstantsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn check_rate(key: &str, rate: Decimal) -> Result<(), ConstantsError> {
    check(rate >= Decimal::ZERO && rate <= Decimal::ONE, key, rate)
}

fn check_pct(key: &str, pct: Decimal, max: Decimal) -> Result<(), ConstantsError> {
    check(pct >= Decimal::ZERO && pct <= max, key, pct)
}

/// Reject a table the calculators cannot run against
///
/// Assumption percentages must sit inside the ranges the calculators accept
/// for the same user inputs.
pub fn validate(constants: &PensionConstants) -> Result<(), ConstantsError> {
    let sp = &constants.state_pension;
    check(sp.full_qualifying_years > 0, "state_pension.full_qualifying_years", sp.full_qualifying_years)?;
    check(
        sp.min_qualifying_years <= sp.full_qualifying_years,
        "state_pension.min_qualifying_years",
        sp.min_qualifying_years,
    )?;
    check(sp.full_weekly_rate >= Decimal::ZERO, "state_pension.full_weekly_rate", sp.full_weekly_rate)?;
    check(sp.class3_weekly_rate >= Decimal::ZERO, "state_pension.class3_weekly_rate", sp.class3_weekly_rate)?;
    check_rate("state_pension.triple_lock_rate", sp.triple_lock_rate)?;

    check(
        constants.income_tax.personal_allowance >= Decimal::ZERO,
        "income_tax.personal_allowance",
        constants.income_tax.personal_allowance,
    )?;

    let ni = &constants.national_insurance;
    check_rate("ni.main_rate", ni.main_rate)?;
    check_rate("ni.upper_rate", ni.upper_rate)?;
    check_rate("ni.employer_rate", ni.employer_rate)?;
    check(ni.primary_threshold <= ni.upper_earnings_limit, "ni.primary_threshold", ni.primary_threshold)?;

    let al = &constants.allowances;
    check(al.minimum_allowance <= al.annual_allowance, "allowance.minimum", al.minimum_allowance)?;
    check_rate("allowance.tax_free_lump_sum_rate", al.tax_free_lump_sum_rate)?;

    let a = &constants.assumptions;
    check_pct("assumptions.growth_pct", a.growth_pct, dec!(20))?;
    check_pct("assumptions.charges_pct", a.charges_pct, dec!(5))?;
    check_pct("assumptions.inflation_pct", a.inflation_pct, dec!(15))?;
    check_pct("assumptions.drawdown_pct", a.drawdown_pct, dec!(20))?;

    let rates = &constants.annuity.rates_per_100k;
    check(!rates.is_empty(), "annuity_rates", "empty")?;
    for (age, rate) in rates {
        check(*rate > Decimal::ZERO, &format!("annuity_rates.{}", age), rate)?;
    }

    Ok(())
}
