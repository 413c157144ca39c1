//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! StdDev is the population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{rolling_mean, rolling_stddev};

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult_x100: u32) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }
    let mult = stddev_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let out = rolling_mean(&closes, period)
        .into_iter()
        .zip(rolling_stddev(&closes, period))
        .map(|(middle, sd)| {
            let (middle, sd) = (middle?, sd?);
            Some(IndicatorValue::Bollinger {
                upper: middle + mult * sd,
                middle,
                lower: middle - mult * sd,
            })
        })
        .collect();

    valued_series(
        bars,
        indicator_type,
        out,
        IndicatorValue::Bollinger {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
        },
    )
}
