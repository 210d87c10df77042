//! Year-by-year accumulation engine shared by the DC and SIPP projectors
//!
//! Contributions are treated as mid-year deposits: each year's growth and
//! charges apply to the opening balance plus half that year's contributions.
//! Growth and charges are rounded to pence before the closing balance is
//! built, so closing(n) = closing(n-1) + contributions + growth - charges
//! holds exactly for every row.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::money::{pct, round_money, safe_ratio};

/// One year of an accumulation projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthYear {
    /// Projection year (1-indexed)
    pub year: u32,
    /// Age at the end of the year
    pub age: u32,
    pub opening_balance: Decimal,
    /// Total invested this year, including any tax relief
    pub contributions: Decimal,
    /// Tax relief included in `contributions`
    pub tax_relief: Decimal,
    pub growth: Decimal,
    pub charges: Decimal,
    pub closing_balance: Decimal,
    /// Closing balance deflated to today's money
    pub real_value: Decimal,
}

/// Parameters of an accumulation run
#[derive(Debug, Clone)]
pub struct AccumulationPlan {
    pub opening_balance: Decimal,
    pub start_age: u32,
    pub years: u32,
    /// Annual amount invested, relief included
    pub annual_contribution: Decimal,
    pub annual_tax_relief: Decimal,
    /// 0-1 fractions
    pub growth_rate: Decimal,
    pub charge_rate: Decimal,
    pub inflation_rate: Decimal,
}

impl AccumulationPlan {
    /// Run the projection. The real value of each year is the nominal closing
    /// balance divided by `(1 + inflation)^year`.
    pub fn project(&self) -> Vec<GrowthYear> {
        let mut rows = Vec::with_capacity(self.years as usize);
        let mut balance = self.opening_balance;
        let deflator_base = Decimal::ONE + self.inflation_rate;

        for year in 1..=self.years {
            let contributions = self.annual_contribution;
            let invested = balance + contributions / dec!(2);
            let growth = round_money(invested * self.growth_rate);
            let charges = round_money(invested * self.charge_rate);
            let closing = balance + contributions + growth - charges;
            let real_value = round_money(safe_ratio(closing, deflator_base.powu(u64::from(year))));

            rows.push(GrowthYear {
                year,
                age: self.start_age + year,
                opening_balance: balance,
                contributions,
                tax_relief: self.annual_tax_relief,
                growth,
                charges,
                closing_balance: closing,
                real_value,
            });

            balance = closing;
        }

        rows
    }
}

/// Totals over a projection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrowthTotals {
    pub contributions: Decimal,
    pub tax_relief: Decimal,
    pub growth: Decimal,
    pub charges: Decimal,
}

pub fn totals(rows: &[GrowthYear]) -> GrowthTotals {
    rows.iter().fold(GrowthTotals::default(), |mut t, r| {
        t.contributions += r.contributions;
        t.tax_relief += r.tax_relief;
        t.growth += r.growth;
        t.charges += r.charges;
        t
    })
}

/// Basic-rate gross-up of a net personal contribution: `net * rate / (1 - rate)`
pub fn relief_at_source(net_contribution: Decimal, basic_rate: Decimal) -> Decimal {
    round_money(safe_ratio(net_contribution * basic_rate, Decimal::ONE - basic_rate))
}

/// How retirement income is drawn from the remaining pot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum IncomeMethod {
    /// Withdraw a fixed percentage of the pot each year
    Drawdown { rate_pct: Decimal },
    /// Buy an annuity paying this percentage of the purchase price
    Annuity { rate_pct: Decimal },
}

impl IncomeMethod {
    pub fn rate_pct(&self) -> Decimal {
        match self {
            IncomeMethod::Drawdown { rate_pct } | IncomeMethod::Annuity { rate_pct } => *rate_pct,
        }
    }

    pub fn annual_income(&self, pot: Decimal) -> Decimal {
        round_money(pot * pct(self.rate_pct()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(years: u32) -> AccumulationPlan {
        AccumulationPlan {
            opening_balance: dec!(50000),
            start_age: 40,
            years,
            annual_contribution: dec!(6000),
            annual_tax_relief: Decimal::ZERO,
            growth_rate: dec!(0.05),
            charge_rate: dec!(0.0075),
            inflation_rate: dec!(0.025),
        }
    }

    #[test]
    fn test_single_year_mid_year_contributions() {
        let rows = plan(1).project();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        // (50000 + 3000) * 5% and * 0.75%
        assert_eq!(row.growth, dec!(2650.00));
        assert_eq!(row.charges, dec!(397.50));
        assert_eq!(row.closing_balance, dec!(58252.50));
        assert_eq!(row.age, 41);
    }

    #[test]
    fn test_rows_telescope() {
        let rows = plan(25).project();
        let mut previous = dec!(50000);
        for row in &rows {
            assert_eq!(row.opening_balance, previous);
            assert_eq!(row.closing_balance, previous + row.contributions + row.growth - row.charges);
            previous = row.closing_balance;
        }

        let t = totals(&rows);
        assert_eq!(previous, dec!(50000) + t.contributions + t.growth - t.charges);
    }

    #[test]
    fn test_real_value_deflates_by_year() {
        let rows = plan(2).project();
        assert_eq!(rows[0].real_value, round_money(rows[0].closing_balance / dec!(1.025)));
        assert_eq!(rows[1].real_value, round_money(rows[1].closing_balance / dec!(1.050625)));
        assert!(rows[1].real_value < rows[1].closing_balance);
    }

    #[test]
    fn test_relief_at_source_gross_up() {
        // £80 net becomes £100 gross at 20%
        assert_eq!(relief_at_source(dec!(80), dec!(0.20)), dec!(20));
        assert_eq!(relief_at_source(dec!(6000), dec!(0.20)), dec!(1500));
    }

    #[test]
    fn test_income_method() {
        let d = IncomeMethod::Drawdown { rate_pct: dec!(4) };
        assert_eq!(d.annual_income(dec!(100000)), dec!(4000));
        let a = IncomeMethod::Annuity { rate_pct: dec!(6.5) };
        assert_eq!(a.annual_income(dec!(100000)), dec!(6500));
    }
}
