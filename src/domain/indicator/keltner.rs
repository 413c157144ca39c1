//! Keltner Channels: EMA(n) of close ± multiplier × ATR(n).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::atr::atr_values;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::ema;

pub fn calculate_keltner(bars: &[Bar], period: usize, atr_mult_x100: u32) -> IndicatorSeries {
    let indicator_type = IndicatorType::Keltner {
        period,
        atr_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }
    let mult = atr_mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let out = ema(&closes, period)
        .into_iter()
        .zip(atr_values(bars, period))
        .map(|(middle, atr)| {
            let (middle, atr) = (middle?, atr?);
            Some(IndicatorValue::Channel {
                upper: middle + mult * atr,
                middle,
                lower: middle - mult * atr,
            })
        })
        .collect();

    valued_series(
        bars,
        indicator_type,
        out,
        IndicatorValue::Channel {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
        },
    )
}
