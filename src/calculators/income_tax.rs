//! Income tax and National Insurance helpers shared by the tax calculators

use rust_decimal::Decimal;

use crate::constants::{NationalInsuranceConstants, TaxSchedule};
use crate::money::non_negative;

/// Employee Class 1 NI on annual employment earnings (two-tier split at the UEL)
pub fn employee_ni(earnings: Decimal, ni: &NationalInsuranceConstants) -> Decimal {
    let main_band = non_negative(earnings.min(ni.upper_earnings_limit) - ni.primary_threshold);
    let upper_band = non_negative(earnings - ni.upper_earnings_limit);
    main_band * ni.main_rate + upper_band * ni.upper_rate
}

/// Employer secondary Class 1 NI on annual employment earnings
pub fn employer_ni(earnings: Decimal, ni: &NationalInsuranceConstants) -> Decimal {
    non_negative(earnings - ni.secondary_threshold) * ni.employer_rate
}

/// Extra income tax caused by adding `extra` on top of `base` income
pub fn tax_on_top_slice(schedule: &TaxSchedule, base: Decimal, extra: Decimal) -> Decimal {
    schedule.income_tax(base + extra) - schedule.income_tax(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PensionConstants;
    use rust_decimal_macros::dec;

    #[test]
    fn test_employee_ni_two_tier() {
        let c = PensionConstants::default();
        let ni = &c.national_insurance;

        assert_eq!(employee_ni(dec!(12000), ni), Decimal::ZERO);
        // (50270 - 12570) * 8% = 3016
        assert_eq!(employee_ni(dec!(50270), ni), dec!(3016));
        // 3016 + 9730 * 2% = 3210.60
        assert_eq!(employee_ni(dec!(60000), ni), dec!(3210.60));
    }

    #[test]
    fn test_employer_ni() {
        let c = PensionConstants::default();
        // (30000 - 9100) * 13.8% = 2884.2
        assert_eq!(employer_ni(dec!(30000), &c.national_insurance), dec!(2884.2));
        assert_eq!(employer_ni(dec!(5000), &c.national_insurance), Decimal::ZERO);
    }

    #[test]
    fn test_tax_on_top_slice() {
        let c = PensionConstants::default();
        let s = &c.income_tax.rest_of_uk;
        // 10000 taxable on top of 45000: 5270 at 20% + 4730 at 40%
        assert_eq!(tax_on_top_slice(s, dec!(45000), dec!(10000)), dec!(2946));
    }
}
