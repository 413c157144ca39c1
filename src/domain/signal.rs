//! Signal classification and the scan engine.
//!
//! The engine ties the pieces together: compute every indicator the voters
//! and gates need, tally votes per bar, classify against the thresholds, and
//! let the gates veto.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bar::BarSeries;
use crate::domain::error::ScanError;
use crate::domain::gate::{apply_all, Gate, GateVerdict};
use crate::domain::indicator::{compute_indicators, IndicatorType};
use crate::domain::vote::{max_score, tally, Tally, Voter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub buy: u32,
    pub sell: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvaluation {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub buy_score: u32,
    pub sell_score: u32,
    pub threshold: Thresholds,
    /// Winning margin over the total voter weight, in `[0, 1]`.
    pub conviction: f64,
    /// Classification before gating.
    pub raw: Signal,
    pub signal: Signal,
    pub blocked: bool,
    pub reasons: Vec<String>,
    pub bullish: Vec<String>,
    pub bearish: Vec<String>,
}

/// Classify a pair of scores.
///
/// When both sides cross their thresholds the larger score wins; a tie is
/// NEUTRAL.
pub fn classify(buy_score: u32, sell_score: u32, thresholds: Thresholds) -> Signal {
    let buy = buy_score >= thresholds.buy;
    let sell = sell_score >= thresholds.sell;
    match (buy, sell) {
        (true, false) => Signal::Buy,
        (false, true) => Signal::Sell,
        (true, true) if buy_score > sell_score => Signal::Buy,
        (true, true) if sell_score > buy_score => Signal::Sell,
        _ => Signal::Neutral,
    }
}

pub fn conviction(signal: Signal, buy_score: u32, sell_score: u32, max_score: u32) -> f64 {
    if max_score == 0 {
        return 0.0;
    }
    let margin = match signal {
        Signal::Buy => buy_score.saturating_sub(sell_score),
        Signal::Sell => sell_score.saturating_sub(buy_score),
        Signal::Neutral => 0,
    };
    f64::from(margin) / f64::from(max_score)
}

#[derive(Debug, Clone)]
pub struct ScanEngine {
    pub voters: Vec<Voter>,
    pub gates: Vec<Gate>,
    pub thresholds: Thresholds,
}

impl ScanEngine {
    pub fn new(voters: Vec<Voter>, gates: Vec<Gate>, thresholds: Thresholds) -> Self {
        Self {
            voters,
            gates,
            thresholds,
        }
    }

    pub fn required_indicators(&self) -> HashSet<IndicatorType> {
        self.voters
            .iter()
            .flat_map(Voter::required_indicators)
            .chain(self.gates.iter().flat_map(Gate::required_indicators))
            .collect()
    }

    /// Reference symbols the gates want, in gate order.
    pub fn reference_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for symbol in self.gates.iter().filter_map(Gate::reference_symbol) {
            if !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
        }
        symbols
    }

    pub fn max_score(&self) -> u32 {
        max_score(&self.voters)
    }

    /// One evaluation per bar of `series`.
    pub fn evaluate(
        &self,
        series: &BarSeries,
        references: &HashMap<String, BarSeries>,
    ) -> Result<Vec<SignalEvaluation>, ScanError> {
        if self.voters.is_empty() {
            return Err(ScanError::RuleInvalid {
                reason: "no voters configured".to_string(),
            });
        }
        if series.is_empty() {
            return Err(ScanError::NoData {
                symbol: series.symbol().to_string(),
            });
        }

        let bars = series.bars();
        let required: Vec<IndicatorType> = self.required_indicators().into_iter().collect();
        let indicators = compute_indicators(bars, &required);
        let tallies = tally(&self.voters, bars, &indicators);
        let verdicts = apply_all(&self.gates, bars, &indicators, references);
        let max = self.max_score();

        Ok(bars
            .iter()
            .zip(tallies)
            .zip(verdicts)
            .map(|((bar, t), verdict)| self.resolve(bar.timestamp, bar.close, t, verdict, max))
            .collect())
    }

    fn resolve(
        &self,
        timestamp: DateTime<Utc>,
        close: f64,
        tally: Tally,
        verdict: GateVerdict,
        max: u32,
    ) -> SignalEvaluation {
        let raw = classify(tally.buy_score, tally.sell_score, self.thresholds);
        let blocked = match raw {
            Signal::Buy => verdict.block_buy,
            Signal::Sell => verdict.block_sell,
            Signal::Neutral => false,
        };
        let signal = if blocked { Signal::Neutral } else { raw };
        SignalEvaluation {
            timestamp,
            close,
            buy_score: tally.buy_score,
            sell_score: tally.sell_score,
            threshold: self.thresholds,
            conviction: conviction(raw, tally.buy_score, tally.sell_score, max),
            raw,
            signal,
            blocked,
            reasons: verdict.reasons,
            bullish: tally.bullish,
            bearish: tally.bearish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;
    use approx::assert_relative_eq;
    use chrono::Weekday;

    const T: Thresholds = Thresholds { buy: 3, sell: 3 };

    #[test]
    fn classify_single_side() {
        assert_eq!(classify(3, 0, T), Signal::Buy);
        assert_eq!(classify(2, 5, T), Signal::Sell);
        assert_eq!(classify(2, 2, T), Signal::Neutral);
    }

    #[test]
    fn classify_both_crossing() {
        assert_eq!(classify(5, 3, T), Signal::Buy);
        assert_eq!(classify(3, 4, T), Signal::Sell);
        assert_eq!(classify(4, 4, T), Signal::Neutral);
    }

    #[test]
    fn conviction_is_margin_over_max() {
        assert_relative_eq!(conviction(Signal::Buy, 5, 1, 8), 0.5);
        assert_relative_eq!(conviction(Signal::Sell, 0, 8, 8), 1.0);
        assert_relative_eq!(conviction(Signal::Neutral, 4, 4, 8), 0.0);
        assert_relative_eq!(conviction(Signal::Buy, 1, 0, 0), 0.0);
    }

    fn engine(gates: Vec<Gate>) -> ScanEngine {
        let voters = vec![
            Voter::parse("above", 2, Some("ABOVE(close, 100)"), Some("BELOW(close, 100)")).unwrap(),
            Voter::parse("wide", 1, Some("ABOVE(close, 100.5)"), Some("BELOW(close, 99.5)")).unwrap(),
        ];
        ScanEngine::new(voters, gates, Thresholds { buy: 3, sell: 3 })
    }

    #[test]
    fn evaluate_classifies_every_bar() {
        let series = BarSeries::from_bars("X", from_closes(&[100.0, 101.0, 102.0, 99.0])).unwrap();
        let evals = engine(vec![]).evaluate(&series, &HashMap::new()).unwrap();
        assert_eq!(evals.len(), 4);
        let signals: Vec<Signal> = evals.iter().map(|e| e.signal).collect();
        assert_eq!(
            signals,
            vec![Signal::Neutral, Signal::Buy, Signal::Buy, Signal::Sell]
        );
        assert_eq!(evals[1].bullish, vec!["above", "wide"]);
        assert_relative_eq!(evals[1].conviction, 1.0);
        assert!(evals.iter().all(|e| !e.blocked));
    }

    #[test]
    fn gates_block_without_touching_scores() {
        let series = BarSeries::from_bars("X", from_closes(&[100.0, 101.0, 102.0])).unwrap();
        // from_closes starts on Tuesday 2024-01-02
        let gates = vec![Gate::Weekdays {
            blocked: vec![Weekday::Tue],
        }];
        let evals = engine(gates).evaluate(&series, &HashMap::new()).unwrap();
        assert_eq!(evals[1].raw, Signal::Buy);
        assert_eq!(evals[1].signal, Signal::Neutral);
        assert!(evals[1].blocked);
        assert_eq!(evals[1].buy_score, 3);
        assert!(!evals[0].blocked);
        assert!(!evals[1].reasons.is_empty());
    }

    #[test]
    fn rejects_empty_series_and_missing_voters() {
        let empty = BarSeries::new("X");
        assert!(matches!(
            engine(vec![]).evaluate(&empty, &HashMap::new()),
            Err(ScanError::NoData { .. })
        ));
        let series = BarSeries::from_bars("X", from_closes(&[1.0])).unwrap();
        let no_voters = ScanEngine::new(vec![], vec![], T);
        assert!(matches!(
            no_voters.evaluate(&series, &HashMap::new()),
            Err(ScanError::RuleInvalid { .. })
        ));
    }

    #[test]
    fn reference_symbols_are_deduplicated() {
        let gate = Gate::CrossAsset {
            symbol: "DX".into(),
            ema_period: 12,
        };
        let e = engine(vec![gate.clone(), gate]);
        assert_eq!(e.reference_symbols(), vec!["DX".to_string()]);
        assert_eq!(e.max_score(), 3);
    }
}
