//! Income tax band schedules (rest of UK and Scotland)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Income tax band a slice of income falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxBand {
    /// Covered by the personal allowance
    Nil,
    /// Scottish starter rate
    Starter,
    Basic,
    /// Scottish intermediate rate
    Intermediate,
    Higher,
    /// Additional rate (rest of UK) or top rate (Scotland)
    Additional,
}

impl TaxBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxBand::Nil => "nil",
            TaxBand::Starter => "starter",
            TaxBand::Basic => "basic",
            TaxBand::Intermediate => "intermediate",
            TaxBand::Higher => "higher",
            TaxBand::Additional => "additional",
        }
    }
}

/// One band of a schedule, expressed in gross annual income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub band: TaxBand,
    /// Income above this amount is taxed in this band
    pub lower: Decimal,
    /// Upper bound of the band (`None` = unbounded)
    pub upper: Option<Decimal>,
    /// Band rate as a 0-1 fraction
    pub rate: Decimal,
}

impl BandSpec {
    fn new(band: TaxBand, lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> Self {
        Self { band, lower, upper, rate }
    }

    /// Portion of `income` that falls inside this band
    pub fn slice_of(&self, income: Decimal) -> Decimal {
        let top = match self.upper {
            Some(upper) => income.min(upper),
            None => income,
        };
        (top - self.lower).max(Decimal::ZERO)
    }
}

/// Ordered, contiguous list of bands starting at zero income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSchedule {
    bands: Vec<BandSpec>,
}

impl TaxSchedule {
    pub fn new(bands: Vec<BandSpec>) -> Self {
        Self { bands }
    }

    /// England, Wales and Northern Ireland
    pub fn rest_of_uk(personal_allowance: Decimal) -> Self {
        Self::new(vec![
            BandSpec::new(TaxBand::Nil, Decimal::ZERO, Some(personal_allowance), Decimal::ZERO),
            BandSpec::new(TaxBand::Basic, personal_allowance, Some(dec!(50270)), dec!(0.20)),
            BandSpec::new(TaxBand::Higher, dec!(50270), Some(dec!(125140)), dec!(0.40)),
            BandSpec::new(TaxBand::Additional, dec!(125140), None, dec!(0.45)),
        ])
    }

    /// Five-band Scottish schedule
    pub fn scottish(personal_allowance: Decimal) -> Self {
        Self::new(vec![
            BandSpec::new(TaxBand::Nil, Decimal::ZERO, Some(personal_allowance), Decimal::ZERO),
            BandSpec::new(TaxBand::Starter, personal_allowance, Some(dec!(14876)), dec!(0.19)),
            BandSpec::new(TaxBand::Basic, dec!(14876), Some(dec!(26561)), dec!(0.20)),
            BandSpec::new(TaxBand::Intermediate, dec!(26561), Some(dec!(43662)), dec!(0.21)),
            BandSpec::new(TaxBand::Higher, dec!(43662), Some(dec!(125140)), dec!(0.42)),
            BandSpec::new(TaxBand::Additional, dec!(125140), None, dec!(0.47)),
        ])
    }

    pub fn bands(&self) -> &[BandSpec] {
        &self.bands
    }

    /// Total income tax due on `income`, summed band by band
    pub fn income_tax(&self, income: Decimal) -> Decimal {
        self.bands
            .iter()
            .map(|b| b.slice_of(income) * b.rate)
            .sum()
    }

    /// Band containing the last pound of `income`
    pub fn marginal_band(&self, income: Decimal) -> &BandSpec {
        self.bands
            .iter()
            .rev()
            .find(|b| income > b.lower)
            .unwrap_or(&self.bands[0])
    }

    /// Rate of the schedule's basic band (the relief-at-source rate)
    pub fn basic_rate(&self) -> Decimal {
        self.bands
            .iter()
            .find(|b| b.band == TaxBand::Basic)
            .map(|b| b.rate)
            .unwrap_or(dec!(0.20))
    }

    /// Upper bound of the basic band
    pub fn basic_rate_limit(&self) -> Decimal {
        self.bands
            .iter()
            .find(|b| b.band == TaxBand::Basic)
            .and_then(|b| b.upper)
            .unwrap_or(dec!(50270))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_of_uk_tax() {
        let s = TaxSchedule::rest_of_uk(dec!(12570));

        assert_eq!(s.income_tax(dec!(12570)), Decimal::ZERO);
        // (50270 - 12570) * 20% = 7540
        assert_eq!(s.income_tax(dec!(50270)), dec!(7540));
        // 7540 + 9730 * 40% = 11432
        assert_eq!(s.income_tax(dec!(60000)), dec!(11432));
    }

    #[test]
    fn test_marginal_band_boundaries() {
        let s = TaxSchedule::rest_of_uk(dec!(12570));

        assert_eq!(s.marginal_band(Decimal::ZERO).band, TaxBand::Nil);
        assert_eq!(s.marginal_band(dec!(12570)).band, TaxBand::Nil);
        assert_eq!(s.marginal_band(dec!(12571)).band, TaxBand::Basic);
        assert_eq!(s.marginal_band(dec!(50270)).band, TaxBand::Basic);
        assert_eq!(s.marginal_band(dec!(50271)).band, TaxBand::Higher);
        assert_eq!(s.marginal_band(dec!(200000)).band, TaxBand::Additional);
    }

    #[test]
    fn test_scottish_rates_strictly_increase() {
        let s = TaxSchedule::scottish(dec!(12570));
        let rates: Vec<_> = s.bands().iter().map(|b| b.rate).collect();
        assert_eq!(rates.len(), 6);
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(s.basic_rate(), dec!(0.20));
    }
}
