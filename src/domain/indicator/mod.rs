//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values, aligned 1:1 with the bars
//!
//! Every `calculate_*` function is a pure transform of a bar slice. Warmup
//! bars are present in the output with `valid == false`.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod divergence;
pub mod donchian;
pub mod ema;
pub mod ichimoku;
pub mod keltner;
pub mod macd;
pub mod mfi;
pub mod momentum;
pub mod obv;
pub mod parabola;
pub mod pivot;
pub mod roc;
pub mod rsi;
pub mod session;
pub mod sma;
pub mod stddev;
pub mod stochastic;
pub mod vwap;
pub mod williams_r;
pub mod wma;

pub use ema::calculate_ema;
pub use sma::calculate_sma;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use crate::domain::bar::Bar;
use crate::domain::rule::{IndicatorField, IndicatorRef};

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Channel {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Ichimoku {
        tenkan: f64,
        kijun: f64,
        senkou_a: f64,
        senkou_b: f64,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
    Pivot {
        pivot: f64,
        r1: f64,
        r2: f64,
        r3: f64,
        s1: f64,
        s2: f64,
        s3: f64,
    },
    Parabola {
        curvature: f64,
        slope: f64,
        fitted: f64,
    },
    Session {
        ny_open: f64,
        london_high: f64,
        london_low: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Wma(usize),
    Rsi(usize),
    Roc(usize),
    Momentum(usize),
    Atr(usize),
    Stddev(usize),
    ZScore(usize),
    Cci(usize),
    WilliamsR(usize),
    Mfi(usize),
    Donchian(usize),
    Adx(usize),
    Parabola(usize),
    Obv,
    Vwap,
    Pivot,
    Session,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Keltner {
        period: usize,
        atr_mult_x100: u32,
    },
    Ichimoku {
        tenkan: usize,
        kijun: usize,
        senkou_b: usize,
    },
    Divergence {
        source: Box<IndicatorRef>,
        pivot: usize,
        lookback: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Empty series, used when parameters make the indicator undefined.
    pub fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Valid `Simple` values as options, invalid or non-simple points as `None`.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| match (p.valid, &p.value) {
                (true, IndicatorValue::Simple(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IndicatorValue {
    /// Read one field; `None` when the field does not belong to this shape.
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        use IndicatorField as F;
        use IndicatorValue as V;
        let v = match (self, field) {
            (V::Simple(v), F::Value) => *v,
            (V::Macd { line, .. }, F::MacdLine) => *line,
            (V::Macd { signal, .. }, F::MacdSignal) => *signal,
            (V::Macd { histogram, .. }, F::MacdHistogram) => *histogram,
            (V::Stochastic { k, .. }, F::StochasticK) => *k,
            (V::Stochastic { d, .. }, F::StochasticD) => *d,
            (V::Bollinger { upper, .. } | V::Channel { upper, .. }, F::Upper) => *upper,
            (V::Bollinger { middle, .. } | V::Channel { middle, .. }, F::Middle) => *middle,
            (V::Bollinger { lower, .. } | V::Channel { lower, .. }, F::Lower) => *lower,
            (V::Ichimoku { tenkan, .. }, F::Tenkan) => *tenkan,
            (V::Ichimoku { kijun, .. }, F::Kijun) => *kijun,
            (V::Ichimoku { senkou_a, .. }, F::SenkouA) => *senkou_a,
            (V::Ichimoku { senkou_b, .. }, F::SenkouB) => *senkou_b,
            (V::Adx { adx, .. }, F::Adx) => *adx,
            (V::Adx { plus_di, .. }, F::PlusDi) => *plus_di,
            (V::Adx { minus_di, .. }, F::MinusDi) => *minus_di,
            (V::Pivot { pivot, .. }, F::Pivot) => *pivot,
            (V::Pivot { r1, .. }, F::R1) => *r1,
            (V::Pivot { r2, .. }, F::R2) => *r2,
            (V::Pivot { r3, .. }, F::R3) => *r3,
            (V::Pivot { s1, .. }, F::S1) => *s1,
            (V::Pivot { s2, .. }, F::S2) => *s2,
            (V::Pivot { s3, .. }, F::S3) => *s3,
            (V::Parabola { curvature, .. }, F::Curvature) => *curvature,
            (V::Parabola { slope, .. }, F::Slope) => *slope,
            (V::Parabola { fitted, .. }, F::Fitted) => *fitted,
            (V::Session { ny_open, .. }, F::NyOpen) => *ny_open,
            (V::Session { london_high, .. }, F::LondonHigh) => *london_high,
            (V::Session { london_low, .. }, F::LondonLow) => *london_low,
            _ => return None,
        };
        Some(v)
    }
}

impl IndicatorSeries {
    /// One field per bar; invalid points and NaN fields are `None`.
    pub fn field_values(&self, field: IndicatorField) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| {
                if !p.valid {
                    return None;
                }
                p.value.field(field).filter(|v| !v.is_nan())
            })
            .collect()
    }
}

impl IndicatorType {
    /// Field read when a rule names the indicator without `.field`.
    pub fn default_field(&self) -> IndicatorField {
        match self {
            IndicatorType::Macd { .. } => IndicatorField::MacdLine,
            IndicatorType::Stochastic { .. } => IndicatorField::StochasticK,
            IndicatorType::Bollinger { .. }
            | IndicatorType::Keltner { .. }
            | IndicatorType::Donchian(_) => IndicatorField::Middle,
            IndicatorType::Ichimoku { .. } => IndicatorField::Tenkan,
            IndicatorType::Adx(_) => IndicatorField::Adx,
            IndicatorType::Pivot => IndicatorField::Pivot,
            IndicatorType::Parabola(_) => IndicatorField::Fitted,
            IndicatorType::Session => IndicatorField::NyOpen,
            _ => IndicatorField::Value,
        }
    }

    /// Indicators that must be computed before this one.
    pub fn dependencies(&self) -> Vec<IndicatorType> {
        match self {
            IndicatorType::Divergence { source, .. } => {
                let mut deps = source.indicator_type.dependencies();
                deps.push(source.indicator_type.clone());
                deps
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Wma(period) => write!(f, "WMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Momentum(period) => write!(f, "MOMENTUM({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::ZScore(period) => write!(f, "ZSCORE({})", period),
            IndicatorType::Cci(period) => write!(f, "CCI({})", period),
            IndicatorType::WilliamsR(period) => write!(f, "WILLIAMS_R({})", period),
            IndicatorType::Mfi(period) => write!(f, "MFI({})", period),
            IndicatorType::Donchian(period) => write!(f, "DONCHIAN({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Parabola(period) => write!(f, "PARABOLA({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Vwap => write!(f, "VWAP"),
            IndicatorType::Pivot => write!(f, "PIVOT"),
            IndicatorType::Session => write!(f, "SESSION"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Keltner {
                period,
                atr_mult_x100,
            } => {
                let mult = *atr_mult_x100 as f64 / 100.0;
                write!(f, "KELTNER({},{})", period, mult)
            }
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou_b,
            } => write!(f, "ICHIMOKU({},{},{})", tenkan, kijun, senkou_b),
            IndicatorType::Divergence {
                source,
                pivot,
                lookback,
            } => write!(f, "DIVERGENCE({},{},{})", source, pivot, lookback),
        }
    }
}

/// Compute a single indicator over `bars`.
///
/// Composite indicators (divergence) compute their source internally; use
/// [`compute_indicators`] to share intermediate series.
pub fn calculate(bars: &[Bar], indicator_type: &IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(n) => sma::calculate_sma(bars, *n),
        IndicatorType::Ema(n) => ema::calculate_ema(bars, *n),
        IndicatorType::Wma(n) => wma::calculate_wma(bars, *n),
        IndicatorType::Rsi(n) => rsi::calculate_rsi(bars, *n),
        IndicatorType::Roc(n) => roc::calculate_roc(bars, *n),
        IndicatorType::Momentum(n) => momentum::calculate_momentum(bars, *n),
        IndicatorType::Atr(n) => atr::calculate_atr(bars, *n),
        IndicatorType::Stddev(n) => stddev::calculate_stddev(bars, *n),
        IndicatorType::ZScore(n) => stddev::calculate_zscore(bars, *n),
        IndicatorType::Cci(n) => cci::calculate_cci(bars, *n),
        IndicatorType::WilliamsR(n) => williams_r::calculate_williams_r(bars, *n),
        IndicatorType::Mfi(n) => mfi::calculate_mfi(bars, *n),
        IndicatorType::Donchian(n) => donchian::calculate_donchian(bars, *n),
        IndicatorType::Adx(n) => adx::calculate_adx(bars, *n),
        IndicatorType::Parabola(n) => parabola::calculate_parabola(bars, *n),
        IndicatorType::Obv => obv::calculate_obv(bars),
        IndicatorType::Vwap => vwap::calculate_vwap(bars),
        IndicatorType::Pivot => pivot::calculate_pivot(bars),
        IndicatorType::Session => session::calculate_session(bars),
        IndicatorType::Macd { fast, slow, signal } => {
            macd::calculate_macd(bars, *fast, *slow, *signal)
        }
        IndicatorType::Stochastic { k_period, d_period } => {
            stochastic::calculate_stochastic(bars, *k_period, *d_period)
        }
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => bollinger::calculate_bollinger(bars, *period, *stddev_mult_x100),
        IndicatorType::Keltner {
            period,
            atr_mult_x100,
        } => keltner::calculate_keltner(bars, *period, *atr_mult_x100),
        IndicatorType::Ichimoku {
            tenkan,
            kijun,
            senkou_b,
        } => ichimoku::calculate_ichimoku(bars, *tenkan, *kijun, *senkou_b),
        IndicatorType::Divergence {
            source,
            pivot,
            lookback,
        } => {
            let source_series = calculate(bars, &source.indicator_type);
            divergence::calculate_divergence(bars, source, &source_series, *pivot, *lookback)
        }
    }
}

/// Compute every requested indicator (and its dependencies) once.
pub fn compute_indicators(
    bars: &[Bar],
    indicator_types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out: HashMap<IndicatorType, IndicatorSeries> = HashMap::new();
    for indicator_type in indicator_types {
        for dep in indicator_type.dependencies() {
            if !out.contains_key(&dep) {
                let series = calculate(bars, &dep);
                out.insert(dep, series);
            }
        }
        if out.contains_key(indicator_type) {
            continue;
        }
        let series = match indicator_type {
            IndicatorType::Divergence {
                source,
                pivot,
                lookback,
            } => match out.get(&source.indicator_type) {
                Some(source_series) => divergence::calculate_divergence(
                    bars,
                    source,
                    source_series,
                    *pivot,
                    *lookback,
                ),
                None => calculate(bars, indicator_type),
            },
            other => calculate(bars, other),
        };
        out.insert(indicator_type.clone(), series);
    }
    out
}

/// Build a `Simple` series from optional values; `None` becomes an invalid point.
pub(crate) fn simple_series(
    bars: &[Bar],
    indicator_type: IndicatorType,
    values: Vec<Option<f64>>,
) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(values)
        .map(|(bar, v)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: v.is_some(),
            value: IndicatorValue::Simple(v.unwrap_or(0.0)),
        })
        .collect();
    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Build a multi-valued series; `None` becomes an invalid point holding `placeholder`.
pub(crate) fn valued_series(
    bars: &[Bar],
    indicator_type: IndicatorType,
    values: Vec<Option<IndicatorValue>>,
    placeholder: IndicatorValue,
) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(values)
        .map(|(bar, v)| match v {
            Some(value) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value,
            },
            None => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: placeholder.clone(),
            },
        })
        .collect();
    IndicatorSeries {
        indicator_type,
        values,
    }
}
