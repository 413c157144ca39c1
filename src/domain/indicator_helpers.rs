//! Shared numeric kernels for indicator calculations.
//!
//! These work on plain `f64` columns and return `Option<f64>` per input
//! element: `None` marks a warmup slot. Indicator modules wrap the result
//! with `simple_series` / `valued_series`.

use crate::domain::bar::Bar;

/// True range per bar. The first bar has no previous close and uses high - low.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

/// Simple moving average; valid from index `period - 1`.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

/// Trailing mean with a minimum of one value: the window widens from the
/// first value until it spans `period`, then rolls.
pub fn partial_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out[i] = Some(sum / (i + 1).min(period) as f64);
    }
    out
}

/// Population standard deviation over a trailing window.
pub fn rolling_stddev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        out[i] = Some(variance.sqrt());
    }
    out
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_fold(values, period, f64::NEG_INFINITY, f64::max)
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_fold(values, period, f64::INFINITY, f64::min)
}

fn rolling_fold(
    values: &[f64],
    period: usize,
    init: f64,
    f: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let folded = values[i + 1 - period..=i].iter().fold(init, |acc, &v| f(acc, v));
        out[i] = Some(folded);
    }
    out
}

/// EMA seeded with the SMA of the first `period` values.
///
/// k = 2/(n+1); valid from index `period - 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current = values[i] * k + current * (1.0 - k);
        out[i] = Some(current);
    }
    out
}

/// Wilder smoothing seeded with the mean of the first `period` values.
///
/// avg[i] = (avg[i-1] * (n-1) + x[i]) / n; valid from index `period - 1`.
pub fn wilder(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);
    for i in period..values.len() {
        current = (current * (period - 1) as f64 + values[i]) / period as f64;
        out[i] = Some(current);
    }
    out
}

/// Apply a kernel to the contiguous valid run that starts at the first `Some`.
///
/// Used for second-stage smoothing (MACD signal, %D, mean of ATR). Slots before
/// the run stay `None`; a gap inside the run ends it.
pub fn over_valid(
    values: &[Option<f64>],
    period: usize,
    kernel: impl Fn(&[f64], usize) -> Vec<Option<f64>>,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };
    let run: Vec<f64> = values[start..].iter().map_while(|v| *v).collect();
    for (offset, v) in kernel(&run, period).into_iter().enumerate() {
        out[start + offset] = v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn true_ranges_first_bar_uses_range() {
        let bars = vec![bar(0, 110.0, 100.0, 105.0), bar(1, 115.0, 108.0, 110.0)];
        let tr = true_ranges(&bars);
        assert_relative_eq!(tr[0], 10.0);
        // max(7, |115-105|, |108-105|) = 10
        assert_relative_eq!(tr[1], 10.0);
    }

    #[test]
    fn rolling_mean_warmup_and_values() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0);
        assert_relative_eq!(out[3].unwrap(), 3.0);
    }

    #[test]
    fn partial_mean_widens_then_rolls() {
        let out = partial_mean(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_relative_eq!(out[0].unwrap(), 2.0);
        assert_relative_eq!(out[1].unwrap(), 3.0);
        assert_relative_eq!(out[2].unwrap(), 4.0);
        assert_relative_eq!(out[3].unwrap(), 6.0);

        let behind_gap = over_valid(&[None, Some(4.0), Some(8.0)], 5, partial_mean);
        assert_eq!(behind_gap[0], None);
        assert_relative_eq!(behind_gap[1].unwrap(), 4.0);
        assert_relative_eq!(behind_gap[2].unwrap(), 6.0);
    }

    #[test]
    fn rolling_stddev_population() {
        let out = rolling_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        assert_relative_eq!(out[7].unwrap(), 2.0);
    }

    #[test]
    fn rolling_extremes() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rolling_max(&values, 2), vec![None, Some(3.0), Some(4.0), Some(4.0), Some(5.0)]);
        assert_eq!(rolling_min(&values, 3), vec![None, None, Some(1.0), Some(1.0), Some(1.0)]);
    }

    #[test]
    fn ema_is_sma_seeded() {
        let out = ema(&[10.0, 20.0, 30.0, 40.0], 3);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 20.0);
        assert_relative_eq!(out[3].unwrap(), 30.0);
    }

    #[test]
    fn wilder_smoothing() {
        let out = wilder(&[10.0, 10.0, 10.0, 20.0], 3);
        assert_relative_eq!(out[2].unwrap(), 10.0);
        assert_relative_eq!(out[3].unwrap(), (10.0 * 2.0 + 20.0) / 3.0);
    }

    #[test]
    fn over_valid_offsets_into_the_run() {
        let values = [None, None, Some(1.0), Some(2.0), Some(3.0)];
        let out = over_valid(&values, 2, rolling_mean);
        assert_eq!(out, vec![None, None, None, Some(1.5), Some(2.5)]);
    }

    #[test]
    fn zero_period_is_all_none() {
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(Option::is_none));
        assert!(ema(&[1.0, 2.0], 0).iter().all(Option::is_none));
        assert!(wilder(&[1.0, 2.0], 0).iter().all(Option::is_none));
        assert!(rolling_max(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }
}
