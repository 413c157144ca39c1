//! Momentum: C[i] - C[i-n]. Warmup: first n bars invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{simple_series, IndicatorSeries, IndicatorType};

pub fn calculate_momentum(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Momentum(period));
    }
    let out = (0..bars.len())
        .map(|i| (i >= period).then(|| bars[i].close - bars[i - period].close))
        .collect();
    simple_series(bars, IndicatorType::Momentum(period), out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;

    #[test]
    fn momentum_difference() {
        let series = calculate_momentum(&from_closes(&[10.0, 12.0, 9.0, 15.0]), 2);
        assert_eq!(
            series.simple_values(),
            vec![None, None, Some(-1.0), Some(3.0)]
        );
    }

    #[test]
    fn momentum_period_0() {
        assert!(calculate_momentum(&from_closes(&[1.0]), 0).values.is_empty());
    }
}
