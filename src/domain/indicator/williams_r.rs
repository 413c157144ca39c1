//! Williams %R = -100 × (HH(n) - C) / (HH(n) - LL(n)); -50 on a flat range.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{rolling_max, rolling_min};

pub fn calculate_williams_r(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::WilliamsR(period));
    }
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let out = rolling_max(&highs, period)
        .into_iter()
        .zip(rolling_min(&lows, period))
        .zip(bars)
        .map(|((hh, ll), bar)| {
            let (hh, ll) = (hh?, ll?);
            let range = hh - ll;
            Some(if range > 0.0 {
                -100.0 * (hh - bar.close) / range
            } else {
                -50.0
            })
        })
        .collect();

    simple_series(bars, IndicatorType::WilliamsR(period), out)
}
