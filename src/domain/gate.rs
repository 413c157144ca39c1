//! Gating filters.
//!
//! A gate never touches scores. It only tells the signal stage that a raw
//! BUY and/or SELL on a bar must be suppressed, and why.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{Datelike, Timelike, Weekday};

use crate::domain::bar::{Bar, BarSeries};
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{ema, over_valid, partial_mean};
use crate::domain::rule::{divergence_type, IndicatorField, IndicatorRef};

#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// Only bars whose UTC hour is in `[start_hour, end_hour]` may signal.
    /// `start_hour > end_hour` wraps past midnight.
    Hours { start_hour: u32, end_hour: u32 },
    Weekdays { blocked: Vec<Weekday> },
    /// ATR must be present: ATR >= SMA(ATR) × ratio and ATR / close >= min_pct.
    /// The SMA averages whatever ATR values exist until `sma_period` do.
    Volatility {
        atr_period: usize,
        sma_period: usize,
        ratio: f64,
        min_pct: f64,
    },
    /// Too many recent opposite divergences block a side.
    DivergenceCount {
        source: IndicatorRef,
        pivot: usize,
        lookback: usize,
        window: usize,
        max: usize,
    },
    /// Reference close above its EMA blocks BUY, below blocks SELL.
    CrossAsset { symbol: String, ema_period: usize },
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Hours {
                start_hour,
                end_hour,
            } => write!(f, "hours {:02}-{:02} UTC", start_hour, end_hour),
            Gate::Weekdays { blocked } => {
                let days: Vec<String> = blocked.iter().map(|d| d.to_string()).collect();
                write!(f, "weekdays blocked: {}", days.join(", "))
            }
            Gate::Volatility {
                atr_period,
                sma_period,
                ratio,
                min_pct,
            } => write!(
                f,
                "volatility ATR({}) >= {} x SMA({}) and >= {} of close",
                atr_period, ratio, sma_period, min_pct
            ),
            Gate::DivergenceCount {
                source,
                pivot,
                lookback,
                window,
                max,
            } => write!(
                f,
                "divergence {} pivot={} lookback={}: at most {} in {} bars",
                source, pivot, lookback, max, window
            ),
            Gate::CrossAsset { symbol, ema_period } => {
                write!(f, "cross-asset {} vs EMA({})", symbol, ema_period)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateVerdict {
    pub block_buy: bool,
    pub block_sell: bool,
    pub reasons: Vec<String>,
}

impl GateVerdict {
    fn block(&mut self, buy: bool, sell: bool, reason: String) {
        if buy || sell {
            self.block_buy |= buy;
            self.block_sell |= sell;
            self.reasons.push(reason);
        }
    }

    pub fn merge(&mut self, other: GateVerdict) {
        self.block_buy |= other.block_buy;
        self.block_sell |= other.block_sell;
        self.reasons.extend(other.reasons);
    }
}

impl Gate {
    pub fn required_indicators(&self) -> HashSet<IndicatorType> {
        match self {
            Gate::Volatility { atr_period, .. } => {
                HashSet::from([IndicatorType::Atr(*atr_period)])
            }
            Gate::DivergenceCount {
                source,
                pivot,
                lookback,
                ..
            } => HashSet::from([divergence_type(source, *pivot, *lookback)]),
            _ => HashSet::new(),
        }
    }

    /// Symbol of the reference series this gate reads, if any.
    pub fn reference_symbol(&self) -> Option<&str> {
        match self {
            Gate::CrossAsset { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    /// One verdict per bar.
    pub fn apply(
        &self,
        bars: &[Bar],
        indicators: &HashMap<IndicatorType, IndicatorSeries>,
        references: &HashMap<String, BarSeries>,
    ) -> Vec<GateVerdict> {
        let mut verdicts = vec![GateVerdict::default(); bars.len()];
        match self {
            Gate::Hours {
                start_hour,
                end_hour,
            } => {
                for (verdict, bar) in verdicts.iter_mut().zip(bars) {
                    let hour = bar.timestamp.hour();
                    let inside = if start_hour <= end_hour {
                        (*start_hour..=*end_hour).contains(&hour)
                    } else {
                        hour >= *start_hour || hour <= *end_hour
                    };
                    verdict.block(
                        !inside,
                        !inside,
                        format!("hour {:02} outside {:02}-{:02} UTC", hour, start_hour, end_hour),
                    );
                }
            }
            Gate::Weekdays { blocked } => {
                for (verdict, bar) in verdicts.iter_mut().zip(bars) {
                    let day = bar.timestamp.weekday();
                    let hit = blocked.contains(&day);
                    verdict.block(hit, hit, format!("{} is blocked", day));
                }
            }
            Gate::Volatility {
                atr_period,
                sma_period,
                ratio,
                min_pct,
            } => {
                let atr = indicators
                    .get(&IndicatorType::Atr(*atr_period))
                    .map(|s| s.field_values(IndicatorField::Value))
                    .unwrap_or_else(|| vec![None; bars.len()]);
                let atr_sma = over_valid(&atr, *sma_period, partial_mean);
                for (i, (verdict, bar)) in verdicts.iter_mut().zip(bars).enumerate() {
                    let current = (atr.get(i).copied().flatten(), atr_sma.get(i).copied().flatten());
                    let present = match current {
                        (Some(a), Some(avg)) => {
                            a >= avg * ratio && bar.close > 0.0 && a / bar.close >= *min_pct
                        }
                        _ => false,
                    };
                    verdict.block(
                        !present,
                        !present,
                        format!("ATR({}) not present (chop)", atr_period),
                    );
                }
            }
            Gate::DivergenceCount {
                source,
                pivot,
                lookback,
                window,
                max,
            } => {
                let kind = divergence_type(source, *pivot, *lookback);
                let values = indicators
                    .get(&kind)
                    .map(|s| s.field_values(IndicatorField::Value))
                    .unwrap_or_else(|| vec![None; bars.len()]);
                for (i, verdict) in verdicts.iter_mut().enumerate() {
                    let end = (i + 1).min(values.len());
                    let recent = &values[(i + 1).saturating_sub(*window).min(end)..end];
                    let bearish = recent.iter().flatten().filter(|v| **v < 0.0).count();
                    let bullish = recent.iter().flatten().filter(|v| **v > 0.0).count();
                    verdict.block(
                        bearish > *max,
                        false,
                        format!("{} bearish divergences in {} bars", bearish, window),
                    );
                    verdict.block(
                        false,
                        bullish > *max,
                        format!("{} bullish divergences in {} bars", bullish, window),
                    );
                }
            }
            Gate::CrossAsset { symbol, ema_period } => {
                let Some(reference) = references.get(symbol) else {
                    return verdicts;
                };
                let aligned = align_backward(bars, reference.bars());
                let ref_closes = reference.closes();
                let ref_ema = ema(&ref_closes, *ema_period);
                for (verdict, idx) in verdicts.iter_mut().zip(aligned) {
                    let Some(j) = idx else { continue };
                    let Some(level) = ref_ema[j] else { continue };
                    let close = ref_closes[j];
                    verdict.block(
                        close > level,
                        false,
                        format!("{} above EMA({})", symbol, ema_period),
                    );
                    verdict.block(
                        false,
                        close < level,
                        format!("{} below EMA({})", symbol, ema_period),
                    );
                }
            }
        }
        verdicts
    }
}

/// For every bar, the index of the last reference bar at or before it.
pub fn align_backward(bars: &[Bar], reference: &[Bar]) -> Vec<Option<usize>> {
    let mut j = 0;
    bars.iter()
        .map(|bar| {
            while j < reference.len() && reference[j].timestamp <= bar.timestamp {
                j += 1;
            }
            j.checked_sub(1)
        })
        .collect()
}

/// Combine the verdicts of every gate, bar by bar.
pub fn apply_all(
    gates: &[Gate],
    bars: &[Bar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    references: &HashMap<String, BarSeries>,
) -> Vec<GateVerdict> {
    let mut combined = vec![GateVerdict::default(); bars.len()];
    for gate in gates {
        for (acc, verdict) in combined
            .iter_mut()
            .zip(gate.apply(bars, indicators, references))
        {
            acc.merge(verdict);
        }
    }
    combined
}
