//! Donchian Channel: highest high and lowest low over n bars, middle is their mean.

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{rolling_max, rolling_min};

pub fn calculate_donchian(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Donchian(period));
    }
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let out = rolling_max(&highs, period)
        .into_iter()
        .zip(rolling_min(&lows, period))
        .map(|(upper, lower)| {
            let (upper, lower) = (upper?, lower?);
            Some(IndicatorValue::Channel {
                upper,
                middle: (upper + lower) / 2.0,
                lower,
            })
        })
        .collect();

    valued_series(
        bars,
        IndicatorType::Donchian(period),
        out,
        IndicatorValue::Channel {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
        },
    )
}
