//! ROC (Rate of Change).
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100; ROC = 0 when C[i-n] == 0.
//! Warmup: first n bars invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};

pub fn calculate_roc(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Roc(period));
    }
    let out = (0..bars.len())
        .map(|i| {
            (i >= period).then(|| {
                let prev_close = bars[i - period].close;
                if prev_close == 0.0 {
                    0.0
                } else {
                    (bars[i].close - prev_close) / prev_close * 100.0
                }
            })
        })
        .collect();
    simple_series(bars, IndicatorType::Roc(period), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use crate::domain::indicator::IndicatorValue;

    #[test]
    fn roc_warmup_is_n_bars() {
        let series = calculate_roc(&from_closes(&[100.0, 110.0, 121.0]), 2);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn roc_percentage() {
        let series = calculate_roc(&from_closes(&[100.0, 110.0]), 1);
        if let IndicatorValue::Simple(v) = series.values[1].value {
            assert!((v - 10.0).abs() < 1e-9);
        } else {
            panic!("expected simple value");
        }
    }

    #[test]
    fn roc_zero_previous_close() {
        let series = calculate_roc(&from_closes(&[0.0, 5.0]), 1);
        assert_eq!(series.values[1].value, IndicatorValue::Simple(0.0));
    }
}
