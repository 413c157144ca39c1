//! Classic floor-trader pivots from the previous UTC session.
//!
//! With H, L, C of the last completed UTC day:
//! P = (H + L + C) / 3, R1 = 2P - L, S1 = 2P - H, R2 = P + (H - L),
//! S2 = P - (H - L), R3 = H + 2(P - L), S3 = L - 2(H - P).
//! Bars of the first day in the series are invalid.

use chrono::NaiveDate;

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};

struct DayRange {
    date: NaiveDate,
    high: f64,
    low: f64,
    close: f64,
}

pub fn calculate_pivot(bars: &[Bar]) -> IndicatorSeries {
    let mut current: Option<DayRange> = None;
    let mut levels: Option<IndicatorValue> = None;

    let out = bars
        .iter()
        .map(|bar| {
            let date = bar.timestamp.date_naive();
            match current.as_mut() {
                Some(day) if day.date == date => {
                    day.high = day.high.max(bar.high);
                    day.low = day.low.min(bar.low);
                    day.close = bar.close;
                }
                _ => {
                    if let Some(done) = current.take() {
                        levels = Some(floor_pivots(done.high, done.low, done.close));
                    }
                    current = Some(DayRange {
                        date,
                        high: bar.high,
                        low: bar.low,
                        close: bar.close,
                    });
                }
            }
            levels.clone()
        })
        .collect();

    valued_series(
        bars,
        IndicatorType::Pivot,
        out,
        IndicatorValue::Pivot {
            pivot: 0.0,
            r1: 0.0,
            r2: 0.0,
            r3: 0.0,
            s1: 0.0,
            s2: 0.0,
            s3: 0.0,
        },
    )
}

fn floor_pivots(high: f64, low: f64, close: f64) -> IndicatorValue {
    let pivot = (high + low + close) / 3.0;
    IndicatorValue::Pivot {
        pivot,
        r1: 2.0 * pivot - low,
        r2: pivot + (high - low),
        r3: high + 2.0 * (pivot - low),
        s1: 2.0 * pivot - high,
        s2: pivot - (high - low),
        s3: low - 2.0 * (high - pivot),
    }
}
