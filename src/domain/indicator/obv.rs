//! OBV (On-Balance Volume).

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};

/// Calculate OBV.
///
/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period; all bars are valid.
pub fn calculate_obv(bars: &[Bar]) -> IndicatorSeries {
    let mut obv = 0.0;
    let out = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                obv = bar.volume;
            } else if bar.close > bars[i - 1].close {
                obv += bar.volume;
            } else if bar.close < bars[i - 1].close {
                obv -= bar.volume;
            }
            Some(obv)
        })
        .collect();
    simple_series(bars, IndicatorType::Obv, out)
}
