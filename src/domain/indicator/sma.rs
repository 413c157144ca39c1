//! Simple Moving Average over closing prices.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::rolling_mean;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Sma(period));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    simple_series(bars, IndicatorType::Sma(period), rolling_mean(&closes, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use crate::domain::indicator::IndicatorValue;

    #[test]
    fn sma_warmup() {
        let bars = from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let series = calculate_sma(&bars, 3);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn sma_values() {
        let bars = from_closes(&[2.0, 4.0, 6.0, 8.0]);
        let series = calculate_sma(&bars, 2);
        assert_eq!(series.values[1].value, IndicatorValue::Simple(3.0));
        assert_eq!(series.values[3].value, IndicatorValue::Simple(7.0));
    }

    #[test]
    fn sma_period_longer_than_input() {
        let bars = from_closes(&[1.0, 2.0]);
        let series = calculate_sma(&bars, 5);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn sma_period_0() {
        let bars = from_closes(&[1.0, 2.0]);
        assert!(calculate_sma(&bars, 0).values.is_empty());
    }
}
