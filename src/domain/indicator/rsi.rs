//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); if avg_loss == 0, RSI = 100.
//! Warmup: first n bars are invalid (n price changes are needed).

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::wilder;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.len() < 2 {
        return simple_series(bars, IndicatorType::Rsi(period), vec![None; bars.len()]);
    }

    let mut gains = Vec::with_capacity(bars.len() - 1);
    let mut losses = Vec::with_capacity(bars.len() - 1);
    for pair in bars.windows(2) {
        let change = pair[1].close - pair[0].close;
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let avg_gain = wilder(&gains, period);
    let avg_loss = wilder(&losses, period);

    let mut out = vec![None];
    out.extend(avg_gain.iter().zip(&avg_loss).map(|(g, l)| match (g, l) {
        (Some(g), Some(l)) => Some(rsi_from_averages(*g, *l)),
        _ => None,
    }));

    simple_series(bars, IndicatorType::Rsi(period), out)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
