//! Commodity Channel Index.
//!
//! CCI = (TP - SMA(TP)) / (0.015 × mean absolute deviation of TP), 0 when the
//! deviation is zero. Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};

const CCI_CONSTANT: f64 = 0.015;

pub fn calculate_cci(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Cci(period));
    }
    let typical: Vec<f64> = bars.iter().map(Bar::typical_price).collect();

    let out = (0..bars.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &typical[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let mean_dev = window.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
            Some(if mean_dev > 0.0 {
                (typical[i] - mean) / (CCI_CONSTANT * mean_dev)
            } else {
                0.0
            })
        })
        .collect();

    simple_series(bars, IndicatorType::Cci(period), out)
}
