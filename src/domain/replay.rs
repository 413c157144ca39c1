//! Forward-return replay of a signal history.

use crate::domain::signal::{Signal, SignalEvaluation};

pub const DEFAULT_HORIZONS: [usize; 3] = [1, 5, 10];

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonStats {
    pub signal: Signal,
    pub horizon: usize,
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
    /// Mean raw forward return.
    pub avg_return: f64,
    /// Mean return in the direction of the signal (SELL returns negated).
    pub avg_directional_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub bars: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub blocked_signals: usize,
    /// Delivered BUY/SELL signals, one row per (signal, horizon).
    pub stats: Vec<HorizonStats>,
    /// Signals suppressed by gates, keyed by their raw classification.
    pub blocked: Vec<HorizonStats>,
}

impl ReplayReport {
    pub fn get(&self, signal: Signal, horizon: usize) -> Option<&HorizonStats> {
        self.stats
            .iter()
            .find(|s| s.signal == signal && s.horizon == horizon)
    }

    pub fn get_blocked(&self, signal: Signal, horizon: usize) -> Option<&HorizonStats> {
        self.blocked
            .iter()
            .find(|s| s.signal == signal && s.horizon == horizon)
    }
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    wins: usize,
    sum_return: f64,
    sum_directional: f64,
}

impl Accumulator {
    fn add(&mut self, signal: Signal, r: f64) {
        let directional = if signal == Signal::Sell { -r } else { r };
        self.count += 1;
        if directional > 0.0 {
            self.wins += 1;
        }
        self.sum_return += r;
        self.sum_directional += directional;
    }

    fn finish(self, signal: Signal, horizon: usize) -> HorizonStats {
        let n = self.count as f64;
        let mean = |sum: f64| if self.count > 0 { sum / n } else { 0.0 };
        HorizonStats {
            signal,
            horizon,
            count: self.count,
            wins: self.wins,
            win_rate: mean(self.wins as f64),
            avg_return: mean(self.sum_return),
            avg_directional_return: mean(self.sum_directional),
        }
    }
}

/// Realized return from bar `i` to bar `i + horizon`, if both exist.
pub fn forward_return(evaluations: &[SignalEvaluation], i: usize, horizon: usize) -> Option<f64> {
    let entry = evaluations.get(i)?.close;
    let exit = evaluations.get(i + horizon)?.close;
    if horizon == 0 || entry == 0.0 {
        return None;
    }
    Some(exit / entry - 1.0)
}

pub fn replay(evaluations: &[SignalEvaluation], horizons: &[usize]) -> ReplayReport {
    let collect = |blocked: bool| -> Vec<HorizonStats> {
        let mut rows = Vec::new();
        for signal in [Signal::Buy, Signal::Sell] {
            for &horizon in horizons {
                let mut acc = Accumulator::default();
                for (i, eval) in evaluations.iter().enumerate() {
                    let side = if blocked { eval.raw } else { eval.signal };
                    if eval.blocked != blocked || side != signal {
                        continue;
                    }
                    if let Some(r) = forward_return(evaluations, i, horizon) {
                        acc.add(signal, r);
                    }
                }
                rows.push(acc.finish(signal, horizon));
            }
        }
        rows
    };

    ReplayReport {
        bars: evaluations.len(),
        buy_signals: evaluations.iter().filter(|e| e.signal == Signal::Buy).count(),
        sell_signals: evaluations.iter().filter(|e| e.signal == Signal::Sell).count(),
        blocked_signals: evaluations.iter().filter(|e| e.blocked).count(),
        stats: collect(false),
        blocked: collect(true),
    }
}
