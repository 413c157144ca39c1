//! Average True Range.
//!
//! Seed is the mean true range over the first n bars, then Wilder smoothing:
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n. Warmup: first (n-1) bars invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{true_ranges, wilder};

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }
    simple_series(
        bars,
        IndicatorType::Atr(period),
        atr_values(bars, period),
    )
}

/// Raw ATR column, shared with Keltner, ADX and the trade simulator.
pub fn atr_values(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    wilder(&true_ranges(bars), period)
}
