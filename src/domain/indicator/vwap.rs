//! Intraday VWAP with a daily reset on the UTC calendar date.
//!
//! VWAP[i] = Σ(TP × volume) / Σ(volume) over the bars of the same UTC day up
//! to and including i. While the day has no volume yet, the previous VWAP is
//! carried forward; before any volume has traded the point is invalid.

use chrono::NaiveDate;

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};

pub fn calculate_vwap(bars: &[Bar]) -> IndicatorSeries {
    let mut day: Option<NaiveDate> = None;
    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;
    let mut last: Option<f64> = None;

    let out = bars
        .iter()
        .map(|bar| {
            let date = bar.timestamp.date_naive();
            if day != Some(date) {
                day = Some(date);
                pv_sum = 0.0;
                vol_sum = 0.0;
            }
            if bar.volume > 0.0 {
                pv_sum += bar.typical_price() * bar.volume;
                vol_sum += bar.volume;
            }
            if vol_sum > 0.0 {
                last = Some(pv_sum / vol_sum);
            }
            last
        })
        .collect();

    simple_series(bars, IndicatorType::Vwap, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(day: u32, hour: u32, price: f64, volume: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    #[test]
    fn vwap_weights_by_volume() {
        let bars = vec![bar(4, 9, 10.0, 100.0), bar(4, 10, 20.0, 300.0)];
        let series = calculate_vwap(&bars);
        assert_eq!(series.simple_values(), vec![Some(10.0), Some(17.5)]);
    }

    #[test]
    fn vwap_resets_each_utc_day() {
        let bars = vec![
            bar(4, 22, 10.0, 100.0),
            bar(4, 23, 20.0, 100.0),
            bar(5, 0, 30.0, 100.0),
        ];
        let series = calculate_vwap(&bars);
        assert_eq!(series.simple_values()[2], Some(30.0));
    }

    #[test]
    fn vwap_zero_volume_carries_forward() {
        let bars = vec![
            bar(4, 9, 0.0, 0.0),
            bar(4, 10, 10.0, 100.0),
            bar(5, 0, 50.0, 0.0),
        ];
        let series = calculate_vwap(&bars);
        assert_eq!(series.simple_values(), vec![None, Some(10.0), Some(10.0)]);
    }
}
