//! Standard deviation and z-score of closing prices.
//!
//! STDDEV(n) is the population standard deviation over n closes.
//! ZSCORE(n) = (C[i] - SMA(n)[i]) / STDDEV(n)[i], 0 when the window is flat.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{rolling_mean, rolling_stddev};

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Stddev(period));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    simple_series(
        bars,
        IndicatorType::Stddev(period),
        rolling_stddev(&closes, period),
    )
}

pub fn calculate_zscore(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::ZScore(period));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let means = rolling_mean(&closes, period);
    let stddevs = rolling_stddev(&closes, period);

    let out = closes
        .iter()
        .zip(means.iter().zip(&stddevs))
        .map(|(close, pair)| match pair {
            (Some(mean), Some(sd)) if *sd > 0.0 => Some((close - mean) / sd),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        })
        .collect();

    simple_series(bars, IndicatorType::ZScore(period), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use approx::assert_relative_eq;

    #[test]
    fn stddev_known_values() {
        let bars = from_closes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let series = calculate_stddev(&bars, 8);
        assert!(!series.values[6].valid);
        assert_relative_eq!(series.simple_values()[7].unwrap(), 2.0);
    }

    #[test]
    fn stddev_constant_prices_is_zero() {
        let series = calculate_stddev(&from_closes(&[5.0; 4]), 3);
        assert_eq!(series.simple_values()[3], Some(0.0));
    }

    #[test]
    fn zscore_of_last_value() {
        let bars = from_closes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let series = calculate_zscore(&bars, 8);
        // mean 5, sd 2 -> (9 - 5) / 2
        assert_relative_eq!(series.simple_values()[7].unwrap(), 2.0);
    }

    #[test]
    fn zscore_flat_window_is_zero() {
        let series = calculate_zscore(&from_closes(&[3.0; 5]), 3);
        assert_eq!(series.simple_values()[4], Some(0.0));
    }

    #[test]
    fn period_0_is_empty() {
        let bars = from_closes(&[1.0, 2.0]);
        assert!(calculate_stddev(&bars, 0).values.is_empty());
        assert!(calculate_zscore(&bars, 0).values.is_empty());
    }
}
