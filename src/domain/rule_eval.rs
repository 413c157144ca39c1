//! Rule evaluation engine.
//!
//! Evaluates rules against bars and pre-computed indicator values.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules: Evaluate at the given bar index
//! - `CROSS_ABOVE`/`CROSS_BELOW`: Require `index >= 1`, return `false` at index 0
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`
//! - `CONSECUTIVE(rule, N)`: Child must be true for N consecutive bars ending at current
//! - `ANY_OF(rule, N)`: Child must be true at least once in the last N bars
//! - `BULLISH_DIVERGENCE` / `BEARISH_DIVERGENCE`: the divergence series fired
//!   in that direction on this bar
//!
//! Missing or invalid indicator points resolve to NaN, so every comparison
//! against them is false.

use std::collections::HashMap;

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::rule::{divergence_type, IndicatorField, IndicatorRef, Operand, Rule};

const EPSILON: f64 = 1e-9;

pub fn evaluate(
    rule: &Rule,
    bars: &[Bar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
) -> bool {
    let value = |operand: &Operand, index: usize| resolve_operand(operand, bars, indicators, index);

    match rule {
        Rule::CrossAbove { left, right } => {
            if bar_index == 0 {
                return false;
            }
            value(left, bar_index) > value(right, bar_index)
                && value(left, bar_index - 1) <= value(right, bar_index - 1)
        }
        Rule::CrossBelow { left, right } => {
            if bar_index == 0 {
                return false;
            }
            value(left, bar_index) < value(right, bar_index)
                && value(left, bar_index - 1) >= value(right, bar_index - 1)
        }
        Rule::Above { left, right } => value(left, bar_index) > value(right, bar_index),
        Rule::Below { left, right } => value(left, bar_index) < value(right, bar_index),
        Rule::Between {
            operand,
            lower,
            upper,
        } => {
            let v = value(operand, bar_index);
            v >= *lower && v <= *upper
        }
        Rule::Equals { left, right } => {
            (value(left, bar_index) - value(right, bar_index)).abs() < EPSILON
        }
        Rule::And(rules) => rules
            .iter()
            .all(|r| evaluate(r, bars, indicators, bar_index)),
        Rule::Or(rules) => rules
            .iter()
            .any(|r| evaluate(r, bars, indicators, bar_index)),
        Rule::Not(rule) => !evaluate(rule, bars, indicators, bar_index),
        Rule::Consecutive { rule, count } => {
            if *count == 0 || bar_index + 1 < *count {
                return false;
            }
            ((bar_index + 1 - *count)..=bar_index).all(|i| evaluate(rule, bars, indicators, i))
        }
        Rule::AnyOf { rule, count } => {
            if *count == 0 {
                return false;
            }
            let start = bar_index.saturating_sub(*count - 1);
            (start..=bar_index).any(|i| evaluate(rule, bars, indicators, i))
        }
        Rule::BullishDivergence {
            source,
            pivot,
            lookback,
        } => divergence_at(source, *pivot, *lookback, indicators, bar_index) > 0.0,
        Rule::BearishDivergence {
            source,
            pivot,
            lookback,
        } => divergence_at(source, *pivot, *lookback, indicators, bar_index) < 0.0,
    }
}

fn divergence_at(
    source: &IndicatorRef,
    pivot: usize,
    lookback: usize,
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
) -> f64 {
    let iref = IndicatorRef {
        indicator_type: divergence_type(source, pivot, lookback),
        field: IndicatorField::Value,
    };
    resolve_indicator(&iref, indicators, bar_index)
}

pub fn resolve_operand(
    operand: &Operand,
    bars: &[Bar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
) -> f64 {
    let Some(bar) = bars.get(bar_index) else {
        return f64::NAN;
    };
    match operand {
        Operand::Open => bar.open,
        Operand::High => bar.high,
        Operand::Low => bar.low,
        Operand::Close => bar.close,
        Operand::Volume => bar.volume,
        Operand::Constant(v) => *v,
        Operand::Indicator(ind_ref) => resolve_indicator(ind_ref, indicators, bar_index),
    }
}

fn resolve_indicator(
    ind_ref: &IndicatorRef,
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
) -> f64 {
    indicators
        .get(&ind_ref.indicator_type)
        .and_then(|series| series.values.get(bar_index))
        .filter(|point| point.valid)
        .and_then(|point| point.value.field(ind_ref.field))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{IndicatorPoint, IndicatorValue};
    use chrono::{Duration, TimeZone, Utc};

    fn make_bar(i: i64, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            open: close,
            high: close + 5.0,
            low: close - 5.0,
            close,
            volume,
        }
    }

    fn closes(prices: &[f64]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i as i64, c, 1000.0))
            .collect()
    }

    fn make_simple_indicator(
        bars: &[Bar],
        indicator_type: IndicatorType,
        values: &[(bool, f64)],
    ) -> IndicatorSeries {
        IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .zip(values)
                .map(|(bar, &(valid, v))| IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid,
                    value: IndicatorValue::Simple(v),
                })
                .collect(),
        }
    }

    fn sma(period: usize) -> Operand {
        Operand::Indicator(IndicatorRef {
            indicator_type: IndicatorType::Sma(period),
            field: IndicatorField::Value,
        })
    }

    fn close_above(level: f64) -> Rule {
        Rule::Above {
            left: Operand::Close,
            right: Operand::Constant(level),
        }
    }

    #[test]
    fn evaluate_comparisons() {
        let bars = closes(&[105.0]);
        let none = HashMap::new();
        assert!(evaluate(&close_above(100.0), &bars, &none, 0));
        assert!(!evaluate(&close_above(110.0), &bars, &none, 0));
        let below = Rule::Below {
            left: Operand::Close,
            right: Operand::Constant(110.0),
        };
        assert!(evaluate(&below, &bars, &none, 0));
    }

    #[test]
    fn evaluate_between_is_inclusive() {
        let bars = closes(&[50.0, 100.0, 150.0]);
        let rule = Rule::Between {
            operand: Operand::Close,
            lower: 50.0,
            upper: 100.0,
        };
        let none = HashMap::new();
        assert!(evaluate(&rule, &bars, &none, 0));
        assert!(evaluate(&rule, &bars, &none, 1));
        assert!(!evaluate(&rule, &bars, &none, 2));
    }

    #[test]
    fn evaluate_equals_uses_epsilon() {
        let bars = closes(&[100.0, 100.01]);
        let rule = Rule::Equals {
            left: Operand::Close,
            right: Operand::Constant(100.0),
        };
        assert!(evaluate(&rule, &bars, &HashMap::new(), 0));
        assert!(!evaluate(&rule, &bars, &HashMap::new(), 1));
    }

    #[test]
    fn evaluate_cross_above_at_index_0() {
        let bars = closes(&[100.0]);
        let rule = Rule::CrossAbove {
            left: Operand::Close,
            right: Operand::Constant(50.0),
        };
        assert!(!evaluate(&rule, &bars, &HashMap::new(), 0));
    }

    #[test]
    fn evaluate_cross_above_and_below() {
        let bars = closes(&[95.0, 105.0, 95.0]);
        let up = Rule::CrossAbove {
            left: Operand::Close,
            right: Operand::Constant(100.0),
        };
        let down = Rule::CrossBelow {
            left: Operand::Close,
            right: Operand::Constant(100.0),
        };
        let none = HashMap::new();
        assert!(evaluate(&up, &bars, &none, 1));
        assert!(!evaluate(&up, &bars, &none, 2));
        assert!(evaluate(&down, &bars, &none, 2));
    }

    #[test]
    fn evaluate_composites() {
        let bars = closes(&[120.0]);
        let none = HashMap::new();
        let and = Rule::And(vec![close_above(100.0), close_above(110.0)]);
        let and_fails = Rule::And(vec![close_above(130.0), close_above(100.0)]);
        let or = Rule::Or(vec![close_above(130.0), close_above(100.0)]);
        let not = Rule::Not(Box::new(close_above(130.0)));
        assert!(evaluate(&and, &bars, &none, 0));
        assert!(!evaluate(&and_fails, &bars, &none, 0));
        assert!(evaluate(&or, &bars, &none, 0));
        assert!(evaluate(&not, &bars, &none, 0));
    }

    #[test]
    fn evaluate_consecutive() {
        let bars = closes(&[90.0, 101.0, 102.0, 103.0]);
        let rule = Rule::Consecutive {
            rule: Box::new(close_above(100.0)),
            count: 3,
        };
        let none = HashMap::new();
        assert!(!evaluate(&rule, &bars, &none, 1));
        assert!(!evaluate(&rule, &bars, &none, 2));
        assert!(evaluate(&rule, &bars, &none, 3));
    }

    #[test]
    fn evaluate_any_of() {
        let bars = closes(&[101.0, 90.0, 90.0, 90.0]);
        let rule = Rule::AnyOf {
            rule: Box::new(close_above(100.0)),
            count: 3,
        };
        let none = HashMap::new();
        assert!(evaluate(&rule, &bars, &none, 2));
        assert!(!evaluate(&rule, &bars, &none, 3));
    }

    #[test]
    fn invalid_indicator_point_is_never_true() {
        let bars = closes(&[100.0, 100.0]);
        let mut indicators = HashMap::new();
        indicators.insert(
            IndicatorType::Sma(20),
            make_simple_indicator(&bars, IndicatorType::Sma(20), &[(false, 0.0), (true, 90.0)]),
        );
        let above = Rule::Above {
            left: Operand::Close,
            right: sma(20),
        };
        let below = Rule::Below {
            left: Operand::Close,
            right: sma(20),
        };
        assert!(!evaluate(&above, &bars, &indicators, 0));
        assert!(!evaluate(&below, &bars, &indicators, 0));
        assert!(evaluate(&above, &bars, &indicators, 1));
    }

    #[test]
    fn missing_indicator_is_never_true() {
        let bars = closes(&[100.0]);
        let rule = Rule::Below {
            left: sma(5),
            right: Operand::Constant(1e12),
        };
        assert!(!evaluate(&rule, &bars, &HashMap::new(), 0));
    }

    #[test]
    fn evaluate_cross_above_with_indicators() {
        let bars = closes(&[100.0, 100.0, 100.0]);
        let mut indicators = HashMap::new();
        indicators.insert(
            IndicatorType::Sma(5),
            make_simple_indicator(
                &bars,
                IndicatorType::Sma(5),
                &[(true, 9.0), (true, 9.0), (true, 11.0)],
            ),
        );
        indicators.insert(
            IndicatorType::Sma(10),
            make_simple_indicator(
                &bars,
                IndicatorType::Sma(10),
                &[(true, 10.0), (true, 10.0), (true, 10.0)],
            ),
        );
        let rule = Rule::CrossAbove {
            left: sma(5),
            right: sma(10),
        };
        assert!(!evaluate(&rule, &bars, &indicators, 1));
        assert!(evaluate(&rule, &bars, &indicators, 2));
    }

    #[test]
    fn evaluate_divergence_rules() {
        let bars = closes(&[1.0, 2.0, 3.0]);
        let source = IndicatorRef {
            indicator_type: IndicatorType::Rsi(14),
            field: IndicatorField::Value,
        };
        let div = divergence_type(&source, 2, 30);
        let mut indicators = HashMap::new();
        indicators.insert(
            div.clone(),
            make_simple_indicator(&bars, div, &[(true, 0.0), (true, 1.0), (true, -1.0)]),
        );
        let bullish = Rule::BullishDivergence {
            source: source.clone(),
            pivot: 2,
            lookback: 30,
        };
        let bearish = Rule::BearishDivergence {
            source,
            pivot: 2,
            lookback: 30,
        };
        assert!(!evaluate(&bullish, &bars, &indicators, 0));
        assert!(evaluate(&bullish, &bars, &indicators, 1));
        assert!(!evaluate(&bearish, &bars, &indicators, 1));
        assert!(evaluate(&bearish, &bars, &indicators, 2));
    }

    #[test]
    fn resolve_multi_field_indicator() {
        let bars = closes(&[100.0]);
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        let mut indicators = HashMap::new();
        indicators.insert(
            macd.clone(),
            IndicatorSeries {
                indicator_type: macd.clone(),
                values: vec![IndicatorPoint {
                    timestamp: bars[0].timestamp,
                    valid: true,
                    value: IndicatorValue::Macd {
                        line: 1.0,
                        signal: 0.5,
                        histogram: 0.5,
                    },
                }],
            },
        );
        let hist = Operand::Indicator(IndicatorRef {
            indicator_type: macd.clone(),
            field: IndicatorField::MacdHistogram,
        });
        let wrong_field = Operand::Indicator(IndicatorRef {
            indicator_type: macd,
            field: IndicatorField::Upper,
        });
        assert_eq!(resolve_operand(&hist, &bars, &indicators, 0), 0.5);
        assert!(resolve_operand(&wrong_field, &bars, &indicators, 0).is_nan());
    }
}
