//! Stochastic oscillator.
//!
//! %K = 100 × (C - LL(k)) / (HH(k) - LL(k)), 50 on a flat range.
//! %D = SMA(d) of %K. Warmup: (k-1) + (d-1) bars.

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{over_valid, rolling_max, rolling_mean, rolling_min};

pub fn calculate_stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let k_line: Vec<Option<f64>> = rolling_max(&highs, k_period)
        .into_iter()
        .zip(rolling_min(&lows, k_period))
        .zip(bars)
        .map(|((hh, ll), bar)| {
            let (hh, ll) = (hh?, ll?);
            let range = hh - ll;
            Some(if range > 0.0 {
                100.0 * (bar.close - ll) / range
            } else {
                50.0
            })
        })
        .collect();
    let d_line = over_valid(&k_line, d_period, rolling_mean);

    let out = k_line
        .iter()
        .zip(&d_line)
        .map(|(k, d)| {
            Some(IndicatorValue::Stochastic {
                k: (*k)?,
                d: (*d)?,
            })
        })
        .collect();

    valued_series(
        bars,
        indicator_type,
        out,
        IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
    )
}
