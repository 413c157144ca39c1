//! Gold session levels on intraday bars (UTC).
//!
//! - `ny_open`: open of the most recent 13:00 UTC bar at or before the bar.
//! - `london_high` / `london_low`: the 08:00-12:00 UTC range. Inside the
//!   window the values expand bar by bar; after it they are the full session
//!   range of the same day; before 08:00 they are the full range of the
//!   most recent earlier day that had London bars, so a Sunday-evening
//!   futures reopen does not hide Friday's range on Monday morning.
//!
//! Missing levels are NaN, so comparisons against them are false. A point is
//! valid when at least one level is known.

use chrono::{NaiveDate, Timelike};
use std::collections::HashMap;

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const NY_OPEN_HOUR_UTC: u32 = 13;
pub const LONDON_START_HOUR_UTC: u32 = 8;
pub const LONDON_END_HOUR_UTC: u32 = 12;

fn in_london(hour: u32) -> bool {
    (LONDON_START_HOUR_UTC..=LONDON_END_HOUR_UTC).contains(&hour)
}

pub fn calculate_session(bars: &[Bar]) -> IndicatorSeries {
    // Full London range per day, needed for bars after the window.
    let mut full: HashMap<NaiveDate, (f64, f64)> = HashMap::new();
    for bar in bars.iter().filter(|b| in_london(b.timestamp.hour())) {
        let entry = full
            .entry(bar.timestamp.date_naive())
            .or_insert((f64::NEG_INFINITY, f64::INFINITY));
        entry.0 = entry.0.max(bar.high);
        entry.1 = entry.1.min(bar.low);
    }

    let mut ny_open = f64::NAN;
    let mut current_day: Option<NaiveDate> = None;
    let mut previous_london: Option<NaiveDate> = None;
    let mut running = (f64::NEG_INFINITY, f64::INFINITY);

    let values = bars
        .iter()
        .map(|bar| {
            let date = bar.timestamp.date_naive();
            let hour = bar.timestamp.hour();
            if current_day != Some(date) {
                if let Some(day) = current_day.filter(|d| full.contains_key(d)) {
                    previous_london = Some(day);
                }
                current_day = Some(date);
                running = (f64::NEG_INFINITY, f64::INFINITY);
            }
            if hour == NY_OPEN_HOUR_UTC {
                ny_open = bar.open;
            }

            let (london_high, london_low) = if in_london(hour) {
                running = (running.0.max(bar.high), running.1.min(bar.low));
                running
            } else {
                let day = if hour > LONDON_END_HOUR_UTC {
                    Some(date)
                } else {
                    previous_london
                };
                day.and_then(|d| full.get(&d).copied())
                    .unwrap_or((f64::NAN, f64::NAN))
            };

            let valid = !(ny_open.is_nan() && london_high.is_nan());
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Session {
                    ny_open,
                    london_high,
                    london_low,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Session,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::IndicatorField;
    use chrono::{TimeZone, Utc};

    fn bar(day: u32, hour: u32, high: f64, low: f64) -> Bar {
        let mid = (high + low) / 2.0;
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            open: mid,
            high,
            low,
            close: mid,
            volume: 1.0,
        }
    }

    fn day_of_bars(day: u32, offset: f64) -> Vec<Bar> {
        (0..24)
            .map(|h| bar(day, h, 100.0 + offset + h as f64, 90.0 + offset - h as f64))
            .collect()
    }

    #[test]
    fn london_range_expands_inside_window() {
        let bars = day_of_bars(4, 0.0);
        let series = calculate_session(&bars);
        let highs = series.field_values(IndicatorField::LondonHigh);
        assert_eq!(highs[8], Some(108.0));
        assert_eq!(highs[10], Some(110.0));
        assert_eq!(highs[12], Some(112.0));
    }

    #[test]
    fn london_range_is_full_session_after_window() {
        let bars = day_of_bars(4, 0.0);
        let series = calculate_session(&bars);
        let highs = series.field_values(IndicatorField::LondonHigh);
        let lows = series.field_values(IndicatorField::LondonLow);
        assert_eq!(highs[20], Some(112.0));
        assert_eq!(lows[20], Some(78.0));
    }

    #[test]
    fn london_range_uses_previous_day_before_window() {
        let mut bars = day_of_bars(4, 0.0);
        bars.extend(day_of_bars(5, 50.0));
        let series = calculate_session(&bars);
        let highs = series.field_values(IndicatorField::LondonHigh);
        // 2024-03-05 03:00 -> previous day's full session
        assert_eq!(highs[24 + 3], Some(112.0));
        // first day before London has nothing
        assert_eq!(highs[3], None);
    }

    #[test]
    fn monday_morning_uses_friday_across_sunday_reopen() {
        // 2024-03-01 is a Friday
        let bars = vec![
            bar(1, 8, 110.0, 100.0),
            bar(1, 12, 112.0, 101.0),
            bar(1, 15, 111.0, 105.0),
            bar(3, 22, 109.0, 104.0),
            bar(3, 23, 109.5, 104.5),
            bar(4, 1, 108.0, 103.0),
            bar(4, 9, 108.0, 102.0),
        ];
        let series = calculate_session(&bars);
        let highs = series.field_values(IndicatorField::LondonHigh);
        let lows = series.field_values(IndicatorField::LondonLow);
        assert_eq!(
            highs,
            vec![
                Some(110.0),
                Some(112.0),
                Some(112.0),
                None,
                None,
                Some(112.0),
                Some(108.0)
            ]
        );
        assert_eq!(lows[5], Some(100.0));
    }

    #[test]
    fn ny_open_is_carried_forward() {
        let mut bars = day_of_bars(4, 0.0);
        bars.extend(day_of_bars(5, 50.0));
        let series = calculate_session(&bars);
        let ny = series.field_values(IndicatorField::NyOpen);
        assert_eq!(ny[12], None);
        let expected = (113.0 + 77.0) / 2.0;
        assert_eq!(ny[13], Some(expected));
        assert_eq!(ny[24 + 5], Some(expected));
    }

    #[test]
    fn empty_input() {
        assert!(calculate_session(&[]).values.is_empty());
    }
}
