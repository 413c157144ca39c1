//! Money Flow Index: a volume-weighted RSI over typical price.
//!
//! Raw flow = TP × volume, positive when TP rises, negative when it falls.
//! MFI = 100 - 100 / (1 + positive / negative) over the last n flows; 100 when
//! there is no negative flow, 50 when there is no flow at all.
//! Warmup: first n bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};

pub fn calculate_mfi(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Mfi(period));
    }

    let mut positive = vec![0.0; bars.len()];
    let mut negative = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let tp = bars[i].typical_price();
        let prev_tp = bars[i - 1].typical_price();
        let flow = tp * bars[i].volume;
        if tp > prev_tp {
            positive[i] = flow;
        } else if tp < prev_tp {
            negative[i] = flow;
        }
    }

    let out = (0..bars.len())
        .map(|i| {
            if i < period {
                return None;
            }
            let pos: f64 = positive[i + 1 - period..=i].iter().sum();
            let neg: f64 = negative[i + 1 - period..=i].iter().sum();
            Some(match (pos > 0.0, neg > 0.0) {
                (_, true) => 100.0 - 100.0 / (1.0 + pos / neg),
                (true, false) => 100.0,
                (false, false) => 50.0,
            })
        })
        .collect();

    simple_series(bars, IndicatorType::Mfi(period), out)
}
