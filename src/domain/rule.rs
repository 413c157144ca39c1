//! Rule AST data structures.
//!
//! This module defines the abstract syntax tree for vote rules:
//! - `Operand`: What can be compared (price fields, constants, indicators)
//! - `IndicatorRef`: Reference to an indicator with a specific field
//! - `IndicatorField`: Which field of a multi-value indicator to use
//! - `Rule`: The rule AST with comparison, composite, temporal and divergence variants
//!
//! `Display` renders the DSL spelling accepted by `rule_parser::parse`.

use std::collections::HashSet;
use std::fmt;

use crate::domain::indicator::IndicatorType;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochasticK,
    StochasticD,
    Upper,
    Middle,
    Lower,
    Tenkan,
    Kijun,
    SenkouA,
    SenkouB,
    Adx,
    PlusDi,
    MinusDi,
    Pivot,
    R1,
    R2,
    R3,
    S1,
    S2,
    S3,
    Curvature,
    Slope,
    Fitted,
    NyOpen,
    LondonHigh,
    LondonLow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    Equals {
        left: Operand,
        right: Operand,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
    BullishDivergence {
        source: IndicatorRef,
        pivot: usize,
        lookback: usize,
    },
    BearishDivergence {
        source: IndicatorRef,
        pivot: usize,
        lookback: usize,
    },
}

/// Indicator series the divergence rules read.
pub fn divergence_type(source: &IndicatorRef, pivot: usize, lookback: usize) -> IndicatorType {
    IndicatorType::Divergence {
        source: Box::new(source.clone()),
        pivot,
        lookback,
    }
}

/// Every indicator a rule reads, so they can be computed once up front.
pub fn extract_indicators(rule: &Rule) -> HashSet<IndicatorType> {
    let mut out = HashSet::new();
    collect_indicators(rule, &mut out);
    out
}

fn collect_indicators(rule: &Rule, out: &mut HashSet<IndicatorType>) {
    fn operand(op: &Operand, out: &mut HashSet<IndicatorType>) {
        if let Operand::Indicator(ind) = op {
            out.insert(ind.indicator_type.clone());
        }
    }
    match rule {
        Rule::CrossAbove { left, right }
        | Rule::CrossBelow { left, right }
        | Rule::Above { left, right }
        | Rule::Below { left, right }
        | Rule::Equals { left, right } => {
            operand(left, out);
            operand(right, out);
        }
        Rule::Between { operand: op, .. } => operand(op, out),
        Rule::And(rules) | Rule::Or(rules) => {
            for r in rules {
                collect_indicators(r, out);
            }
        }
        Rule::Not(inner)
        | Rule::Consecutive { rule: inner, .. }
        | Rule::AnyOf { rule: inner, .. } => collect_indicators(inner, out),
        Rule::BullishDivergence {
            source,
            pivot,
            lookback,
        }
        | Rule::BearishDivergence {
            source,
            pivot,
            lookback,
        } => {
            out.insert(divergence_type(source, *pivot, *lookback));
        }
    }
}

/// Largest number of past bars a rule looks at beyond the current one.
pub fn lookback_bars(rule: &Rule) -> usize {
    match rule {
        Rule::CrossAbove { .. } | Rule::CrossBelow { .. } => 1,
        Rule::Above { .. }
        | Rule::Below { .. }
        | Rule::Equals { .. }
        | Rule::Between { .. }
        | Rule::BullishDivergence { .. }
        | Rule::BearishDivergence { .. } => 0,
        Rule::And(rules) | Rule::Or(rules) => rules.iter().map(lookback_bars).max().unwrap_or(0),
        Rule::Not(inner) => lookback_bars(inner),
        Rule::Consecutive { rule, count } | Rule::AnyOf { rule, count } => {
            count.saturating_sub(1) + lookback_bars(rule)
        }
    }
}

impl fmt::Display for IndicatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use IndicatorField as F;
        use IndicatorType as T;
        match (&self.indicator_type, self.field) {
            (T::Macd { fast, slow, signal }, field) => {
                let name = match field {
                    F::MacdSignal => "MACD_SIGNAL",
                    F::MacdHistogram => "MACD_HISTOGRAM",
                    _ => "MACD_LINE",
                };
                write!(f, "{}({},{},{})", name, fast, slow, signal)
            }
            (T::Stochastic { k_period, d_period }, field) => {
                let name = match field {
                    F::StochasticD => "STOCHASTIC_D",
                    _ => "STOCHASTIC_K",
                };
                write!(f, "{}({},{})", name, k_period, d_period)
            }
            (
                T::Bollinger {
                    period,
                    stddev_mult_x100: mult,
                },
                field,
            ) => write!(
                f,
                "BOLLINGER_{}({},{})",
                band_suffix(field),
                period,
                *mult as f64 / 100.0
            ),
            (
                T::Keltner {
                    period,
                    atr_mult_x100: mult,
                },
                field,
            ) => write!(
                f,
                "KELTNER_{}({},{})",
                band_suffix(field),
                period,
                *mult as f64 / 100.0
            ),
            (T::Donchian(period), field) => {
                write!(f, "DONCHIAN_{}({})", band_suffix(field), period)
            }
            (
                T::Ichimoku {
                    tenkan,
                    kijun,
                    senkou_b,
                },
                field,
            ) => {
                let name = match field {
                    F::Kijun => "KIJUN",
                    F::SenkouA => "SENKOU_A",
                    F::SenkouB => "SENKOU_B",
                    _ => "TENKAN",
                };
                write!(f, "ICHIMOKU_{}({},{},{})", name, tenkan, kijun, senkou_b)
            }
            (T::Adx(period), field) => {
                let name = match field {
                    F::PlusDi => "PLUS_DI",
                    F::MinusDi => "MINUS_DI",
                    _ => "ADX",
                };
                write!(f, "{}({})", name, period)
            }
            (T::Pivot, field) => {
                let name = match field {
                    F::R1 => "PIVOT_R1",
                    F::R2 => "PIVOT_R2",
                    F::R3 => "PIVOT_R3",
                    F::S1 => "PIVOT_S1",
                    F::S2 => "PIVOT_S2",
                    F::S3 => "PIVOT_S3",
                    _ => "PIVOT",
                };
                write!(f, "{}", name)
            }
            (T::Parabola(period), field) => {
                let name = match field {
                    F::Curvature => "CURVATURE",
                    F::Slope => "SLOPE",
                    _ => "FITTED",
                };
                write!(f, "PARABOLA_{}({})", name, period)
            }
            (T::Session, field) => {
                let name = match field {
                    F::LondonHigh => "LONDON_HIGH",
                    F::LondonLow => "LONDON_LOW",
                    _ => "NY_OPEN",
                };
                write!(f, "{}", name)
            }
            (other, _) => write!(f, "{}", other),
        }
    }
}

fn band_suffix(field: IndicatorField) -> &'static str {
    match field {
        IndicatorField::Upper => "UPPER",
        IndicatorField::Lower => "LOWER",
        _ => "MIDDLE",
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Open => write!(f, "open"),
            Operand::High => write!(f, "high"),
            Operand::Low => write!(f, "low"),
            Operand::Close => write!(f, "close"),
            Operand::Volume => write!(f, "volume"),
            Operand::Constant(v) => write!(f, "{}", v),
            Operand::Indicator(ind) => write!(f, "{}", ind),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, rules: &[Rule]) -> fmt::Result {
            write!(f, "{}(", name)?;
            for (i, r) in rules.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", r)?;
            }
            write!(f, ")")
        }

        match self {
            Rule::CrossAbove { left, right } => write!(f, "CROSS_ABOVE({}, {})", left, right),
            Rule::CrossBelow { left, right } => write!(f, "CROSS_BELOW({}, {})", left, right),
            Rule::Above { left, right } => write!(f, "ABOVE({}, {})", left, right),
            Rule::Below { left, right } => write!(f, "BELOW({}, {})", left, right),
            Rule::Equals { left, right } => write!(f, "EQUALS({}, {})", left, right),
            Rule::Between {
                operand,
                lower,
                upper,
            } => write!(f, "BETWEEN({}, {}, {})", operand, lower, upper),
            Rule::And(rules) => list(f, "AND", rules),
            Rule::Or(rules) => list(f, "OR", rules),
            Rule::Not(rule) => write!(f, "NOT({})", rule),
            Rule::Consecutive { rule, count } => write!(f, "CONSECUTIVE({}, {})", rule, count),
            Rule::AnyOf { rule, count } => write!(f, "ANY_OF({}, {})", rule, count),
            Rule::BullishDivergence {
                source,
                pivot,
                lookback,
            } => write!(f, "BULLISH_DIVERGENCE({}, {}, {})", source, pivot, lookback),
            Rule::BearishDivergence {
                source,
                pivot,
                lookback,
            } => write!(f, "BEARISH_DIVERGENCE({}, {}, {})", source, pivot, lookback),
        }
    }
}
