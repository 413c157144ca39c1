//! Ichimoku cloud.
//!
//! Tenkan and kijun are (highest high + lowest low) / 2 over their periods.
//! The leading spans are the values computed `kijun` bars ago, so every
//! field at bar i only uses bars up to i:
//! - senkou_a[i] = (tenkan[i-kijun] + kijun[i-kijun]) / 2
//! - senkou_b[i] = midpoint over `senkou_b` bars ending at i-kijun

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{rolling_max, rolling_min};

fn midpoints(highs: &[f64], lows: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_max(highs, period)
        .into_iter()
        .zip(rolling_min(lows, period))
        .map(|(h, l)| Some((h? + l?) / 2.0))
        .collect()
}

pub fn calculate_ichimoku(
    bars: &[Bar],
    tenkan: usize,
    kijun: usize,
    senkou_b: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ichimoku {
        tenkan,
        kijun,
        senkou_b,
    };
    if tenkan == 0 || kijun == 0 || senkou_b == 0 {
        return IndicatorSeries::empty(indicator_type);
    }
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let tenkan_line = midpoints(&highs, &lows, tenkan);
    let kijun_line = midpoints(&highs, &lows, kijun);
    let span_b_line = midpoints(&highs, &lows, senkou_b);

    let out = (0..bars.len())
        .map(|i| {
            let lagged = i.checked_sub(kijun)?;
            let span_a = (tenkan_line[lagged]? + kijun_line[lagged]?) / 2.0;
            Some(IndicatorValue::Ichimoku {
                tenkan: tenkan_line[i]?,
                kijun: kijun_line[i]?,
                senkou_a: span_a,
                senkou_b: span_b_line[lagged]?,
            })
        })
        .collect();

    valued_series(
        bars,
        indicator_type,
        out,
        IndicatorValue::Ichimoku {
            tenkan: 0.0,
            kijun: 0.0,
            senkou_a: 0.0,
            senkou_b: 0.0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{from_hlcv, wave};

    #[test]
    fn ichimoku_warmup_is_displaced_span_b() {
        let series = calculate_ichimoku(&wave(100), 9, 26, 52);
        // senkou_b needs 52 bars, then 26 bars of displacement
        assert!(!series.values[76].valid);
        assert!(series.values[77].valid);
    }

    #[test]
    fn ichimoku_flat_market() {
        let bars = from_hlcv(&[(11.0, 9.0, 10.0, 1.0); 10]);
        let series = calculate_ichimoku(&bars, 2, 3, 4);
        assert_eq!(
            series.values[9].value,
            IndicatorValue::Ichimoku {
                tenkan: 10.0,
                kijun: 10.0,
                senkou_a: 10.0,
                senkou_b: 10.0
            }
        );
    }
}
