//! Price/oscillator divergence on confirmed swing points.
//!
//! A swing low at bar j has a low strictly below the lows of the `pivot` bars
//! on each side; swing highs mirror this. A swing is only known `pivot` bars
//! after it happens, so detection runs on the confirming bar j + pivot.
//!
//! When a new swing low is confirmed and the previous swing low lies within
//! `lookback` bars of the current bar, price making a lower low while the
//! oscillator makes a higher low is bullish (+1). Swing highs with a higher
//! high on price and a lower high on the oscillator are bearish (-1). Every
//! other bar is 0. If both fire on one bar they cancel out.
//!
//! Warmup: first 2 × pivot bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};
use crate::domain::rule::IndicatorRef;

pub const BULLISH: f64 = 1.0;
pub const BEARISH: f64 = -1.0;

pub fn calculate_divergence(
    bars: &[Bar],
    source: &IndicatorRef,
    source_series: &IndicatorSeries,
    pivot: usize,
    lookback: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Divergence {
        source: Box::new(source.clone()),
        pivot,
        lookback,
    };
    if pivot == 0 || lookback == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let oscillator = source_series.field_values(source.field);
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();

    let mut swing_lows: Vec<usize> = Vec::new();
    let mut swing_highs: Vec<usize> = Vec::new();

    let out = (0..bars.len())
        .map(|i| {
            if i < 2 * pivot {
                return None;
            }
            let j = i - pivot;
            let mut value = 0.0;

            if is_extreme(&lows, j, pivot, |candidate, other| candidate < other) {
                if let Some(&prev) = swing_lows.last() {
                    let lower_low = lows[j] < lows[prev];
                    let higher_osc = matches!(
                        (oscillator.get(prev).copied().flatten(), oscillator.get(j).copied().flatten()),
                        (Some(a), Some(b)) if b > a
                    );
                    if i - prev <= lookback && lower_low && higher_osc {
                        value += BULLISH;
                    }
                }
                swing_lows.push(j);
            }

            if is_extreme(&highs, j, pivot, |candidate, other| candidate > other) {
                if let Some(&prev) = swing_highs.last() {
                    let higher_high = highs[j] > highs[prev];
                    let lower_osc = matches!(
                        (oscillator.get(prev).copied().flatten(), oscillator.get(j).copied().flatten()),
                        (Some(a), Some(b)) if b < a
                    );
                    if i - prev <= lookback && higher_high && lower_osc {
                        value += BEARISH;
                    }
                }
                swing_highs.push(j);
            }

            Some(value)
        })
        .collect();

    simple_series(bars, indicator_type, out)
}

/// True when `values[j]` beats every other value within `pivot` bars on both sides.
fn is_extreme(values: &[f64], j: usize, pivot: usize, beats: impl Fn(f64, f64) -> bool) -> bool {
    let start = j.saturating_sub(pivot);
    let end = (j + pivot).min(values.len() - 1);
    if j < pivot || j + pivot > end {
        return false;
    }
    (start..=end)
        .filter(|&k| k != j)
        .all(|k| beats(values[j], values[k]))
}
