//! One-position trade simulator driven by a signal history.
//!
//! The simulator is flat, long or short at any time. Entries fill at the
//! close of the signal bar; stops and targets are placed in ATR multiples
//! of the entry bar. P&L is per unit of the instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bar::Bar;
use crate::domain::indicator::atr::atr_values;
use crate::domain::signal::{Signal, SignalEvaluation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub stop_atr_mult: f64,
    pub take_atr_mult: f64,
    /// Percentage trailing stop, used when no ATR multiple is set.
    pub trailing_stop_pct: f64,
    pub trailing_stop_atr_mult: Option<f64>,
    pub min_hold_bars: usize,
    pub exit_confirm_bars: usize,
    pub commission_entry: f64,
    pub commission_exit: f64,
    pub atr_period: usize,
    pub allow_shorting: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            stop_atr_mult: 2.0,
            take_atr_mult: 3.0,
            trailing_stop_pct: 0.01,
            trailing_stop_atr_mult: Some(0.5),
            min_hold_bars: 10,
            exit_confirm_bars: 1,
            commission_entry: 3.0,
            commission_exit: 3.0,
            atr_period: 14,
            allow_shorting: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    fn direction(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TrailingStop,
    StopLoss,
    TakeProfit,
    OppositeSignal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    /// `None` when ATR was unavailable at entry.
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Highest high (long) or lowest low (short) since entry.
    pub extreme: f64,
    pub trailing_stop: f64,
    confirm: usize,
}

impl OpenPosition {
    fn open(side: Side, index: usize, bar: &Bar, atr: f64, config: &SimConfig) -> Self {
        let dir = side.direction();
        let (stop_loss, take_profit) = if atr > 0.0 {
            (
                Some(bar.close - dir * config.stop_atr_mult * atr),
                Some(bar.close + dir * config.take_atr_mult * atr),
            )
        } else {
            (None, None)
        };
        let extreme = match side {
            Side::Long => bar.high,
            Side::Short => bar.low,
        };
        let mut position = Self {
            side,
            entry_index: index,
            entry_time: bar.timestamp,
            entry_price: bar.close,
            stop_loss,
            take_profit,
            extreme,
            trailing_stop: extreme,
            confirm: 0,
        };
        position.trail(extreme, atr, config);
        position
    }

    fn trail(&mut self, extreme: f64, atr: f64, config: &SimConfig) {
        let dir = self.side.direction();
        self.extreme = extreme;
        self.trailing_stop = match config.trailing_stop_atr_mult {
            Some(mult) if atr > 0.0 => extreme - dir * mult * atr,
            _ => extreme * (1.0 - dir * config.trailing_stop_pct),
        };
    }

    /// Ratchet the extreme and the trailing level with a new bar.
    fn update(&mut self, bar: &Bar, atr: f64, config: &SimConfig) {
        match self.side {
            Side::Long if bar.high > self.extreme => self.trail(bar.high, atr, config),
            Side::Short if bar.low < self.extreme => self.trail(bar.low, atr, config),
            _ => {}
        }
    }

    /// Price-based exits, in priority order.
    fn price_exit(&self, bar: &Bar, held: usize, config: &SimConfig) -> Option<(ExitReason, f64)> {
        let can_stop = held >= config.min_hold_bars;
        let (trail_hit, stop_hit, take_hit) = match self.side {
            Side::Long => (
                bar.low <= self.trailing_stop,
                self.stop_loss.is_some_and(|s| bar.close <= s),
                self.take_profit.is_some_and(|t| bar.close >= t),
            ),
            Side::Short => (
                bar.high >= self.trailing_stop,
                self.stop_loss.is_some_and(|s| bar.close >= s),
                self.take_profit.is_some_and(|t| bar.close <= t),
            ),
        };
        if can_stop && trail_hit {
            Some((ExitReason::TrailingStop, self.trailing_stop))
        } else if can_stop && stop_hit {
            Some((ExitReason::StopLoss, bar.close))
        } else if take_hit {
            Some((ExitReason::TakeProfit, bar.close))
        } else {
            None
        }
    }

    fn close(
        self,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        exit_reason: ExitReason,
        config: &SimConfig,
    ) -> ClosedTrade {
        let gross_pnl = (exit_price - self.entry_price) * self.side.direction();
        ClosedTrade {
            side: self.side,
            entry_time: self.entry_time,
            exit_time,
            entry_price: self.entry_price,
            exit_price,
            gross_pnl,
            net_pnl: gross_pnl - config.commission_entry - config.commission_exit,
            exit_reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimResult {
    pub trades: Vec<ClosedTrade>,
    /// Position still open after the last bar.
    pub open: Option<OpenPosition>,
}

/// Run the simulator over `bars` and the evaluations computed from them.
///
/// Entries follow the gated signal; exits on an opposite signal follow the
/// raw classification, so a gate never keeps a position open.
pub fn simulate(bars: &[Bar], evaluations: &[SignalEvaluation], config: &SimConfig) -> SimResult {
    let atr = atr_values(bars, config.atr_period);
    let mut trades = Vec::new();
    let mut position: Option<OpenPosition> = None;

    for (i, (bar, eval)) in bars.iter().zip(evaluations).enumerate() {
        let bar_atr = atr.get(i).copied().flatten().unwrap_or(0.0);

        if let Some(mut pos) = position.take() {
            let held = i - pos.entry_index;
            pos.update(bar, bar_atr, config);
            if let Some((reason, price)) = pos.price_exit(bar, held, config) {
                trades.push(pos.close(bar.timestamp, price, reason, config));
                continue;
            }

            let opposite = match pos.side {
                Side::Long => eval.raw == Signal::Sell,
                Side::Short => eval.raw == Signal::Buy,
            };
            if opposite && held >= config.min_hold_bars {
                pos.confirm += 1;
                if pos.confirm >= config.exit_confirm_bars.max(1) {
                    trades.push(pos.close(bar.timestamp, bar.close, ExitReason::OppositeSignal, config));
                    continue;
                }
            } else {
                pos.confirm = 0;
            }
            position = Some(pos);
            continue;
        }

        position = match eval.signal {
            Signal::Buy => Some(OpenPosition::open(Side::Long, i, bar, bar_atr, config)),
            Signal::Sell if config.allow_shorting => {
                Some(OpenPosition::open(Side::Short, i, bar, bar_atr, config))
            }
            _ => None,
        };
    }

    SimResult {
        trades,
        open: position,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStats {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
    pub profit_factor: f64,
    pub avg_trade: f64,
    /// Largest peak-to-trough fall of cumulative net P&L.
    pub max_drawdown: f64,
}

impl TradeStats {
    pub fn compute(trades: &[ClosedTrade]) -> Self {
        let count = trades.len();
        let wins = trades.iter().filter(|t| t.net_pnl > 0.0).count();
        let gross_pnl: f64 = trades.iter().map(|t| t.gross_pnl).sum();
        let net_pnl: f64 = trades.iter().map(|t| t.net_pnl).sum();
        let total_wins: f64 = trades.iter().map(|t| t.net_pnl).filter(|p| *p > 0.0).sum();
        let total_losses: f64 = trades
            .iter()
            .map(|t| t.net_pnl)
            .filter(|p| *p < 0.0)
            .map(f64::abs)
            .sum();

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let mut cumulative = 0.0_f64;
        let mut peak = 0.0_f64;
        let mut max_drawdown = 0.0_f64;
        for trade in trades {
            cumulative += trade.net_pnl;
            peak = peak.max(cumulative);
            max_drawdown = max_drawdown.max(peak - cumulative);
        }

        let (win_rate, avg_trade) = if count > 0 {
            (wins as f64 / count as f64, net_pnl / count as f64)
        } else {
            (0.0, 0.0)
        };

        TradeStats {
            trades: count,
            wins,
            win_rate,
            gross_pnl,
            commission: gross_pnl - net_pnl,
            net_pnl,
            profit_factor,
            avg_trade,
            max_drawdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_hlcv;
    use crate::domain::signal::Thresholds;
    use approx::assert_relative_eq;

    /// Bars with high/low one point either side of the close.
    fn bars(closes: &[f64]) -> Vec<Bar> {
        let rows: Vec<(f64, f64, f64, f64)> =
            closes.iter().map(|&c| (c + 1.0, c - 1.0, c, 100.0)).collect();
        from_hlcv(&rows)
    }

    fn evals(bars: &[Bar], signals: &[Signal]) -> Vec<SignalEvaluation> {
        bars.iter()
            .zip(signals)
            .map(|(bar, &signal)| SignalEvaluation {
                timestamp: bar.timestamp,
                close: bar.close,
                buy_score: 0,
                sell_score: 0,
                threshold: Thresholds { buy: 1, sell: 1 },
                conviction: 0.0,
                raw: signal,
                signal,
                blocked: false,
                reasons: Vec::new(),
                bullish: Vec::new(),
                bearish: Vec::new(),
            })
            .collect()
    }

    fn config() -> SimConfig {
        SimConfig {
            stop_atr_mult: 2.0,
            take_atr_mult: 1.5,
            trailing_stop_pct: 0.5,
            trailing_stop_atr_mult: None,
            min_hold_bars: 10,
            exit_confirm_bars: 1,
            commission_entry: 1.0,
            commission_exit: 1.0,
            atr_period: 1,
            allow_shorting: false,
        }
    }

    use Signal::{Buy, Neutral, Sell};

    #[test]
    fn take_profit_ignores_min_hold() {
        let b = bars(&[100.0, 100.0, 103.0, 103.0]);
        let result = simulate(&b, &evals(&b, &[Buy, Neutral, Neutral, Neutral]), &config());
        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::TakeProfit);
        assert_eq!(t.side, Side::Long);
        assert_relative_eq!(t.exit_price, 103.0);
        assert_relative_eq!(t.gross_pnl, 3.0);
        assert_relative_eq!(t.net_pnl, 1.0);
        assert_eq!(t.exit_time, b[2].timestamp);
        assert!(result.open.is_none());
    }

    #[test]
    fn stop_loss_waits_for_min_hold() {
        let b = bars(&[100.0, 95.0, 95.0]);
        let cfg = SimConfig {
            min_hold_bars: 2,
            ..config()
        };
        let result = simulate(&b, &evals(&b, &[Buy, Neutral, Neutral]), &cfg);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(result.trades[0].exit_time, b[2].timestamp);
        assert_relative_eq!(result.trades[0].gross_pnl, -5.0);
    }

    #[test]
    fn short_trailing_stop_fills_at_trailing_level() {
        let b = bars(&[100.0, 100.5]);
        let cfg = SimConfig {
            trailing_stop_atr_mult: Some(0.5),
            min_hold_bars: 0,
            allow_shorting: true,
            ..config()
        };
        let result = simulate(&b, &evals(&b, &[Sell, Neutral]), &cfg);
        let t = &result.trades[0];
        assert_eq!(t.side, Side::Short);
        assert_eq!(t.exit_reason, ExitReason::TrailingStop);
        // low 99 + 0.5 * ATR 2
        assert_relative_eq!(t.exit_price, 100.0);
        assert_relative_eq!(t.net_pnl, -2.0);
    }

    #[test]
    fn trailing_stop_respects_min_hold() {
        let b = bars(&[100.0, 100.5]);
        let cfg = SimConfig {
            trailing_stop_atr_mult: Some(0.5),
            min_hold_bars: 2,
            allow_shorting: true,
            ..config()
        };
        let result = simulate(&b, &evals(&b, &[Sell, Neutral]), &cfg);
        assert!(result.trades.is_empty());
        assert_eq!(result.open.map(|p| p.side), Some(Side::Short));
    }

    #[test]
    fn opposite_signal_needs_confirmation() {
        let b = bars(&[100.0; 5]);
        let cfg = SimConfig {
            min_hold_bars: 0,
            exit_confirm_bars: 2,
            ..config()
        };
        let result = simulate(&b, &evals(&b, &[Buy, Sell, Sell, Sell, Neutral]), &cfg);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::OppositeSignal);
        assert_eq!(result.trades[0].exit_time, b[2].timestamp);
        // shorting disabled: the later SELL opens nothing
        assert!(result.open.is_none());
    }

    #[test]
    fn blocked_signal_does_not_enter() {
        let b = bars(&[100.0, 100.0]);
        let mut e = evals(&b, &[Buy, Neutral]);
        e[0].signal = Neutral;
        e[0].blocked = true;
        let result = simulate(&b, &e, &config());
        assert!(result.trades.is_empty());
        assert!(result.open.is_none());
    }

    fn trade(net: f64) -> ClosedTrade {
        let ts = bars(&[1.0])[0].timestamp;
        ClosedTrade {
            side: Side::Long,
            entry_time: ts,
            exit_time: ts,
            entry_price: 1.0,
            exit_price: 1.0,
            gross_pnl: net + 2.0,
            net_pnl: net,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn stats_from_trades() {
        let trades: Vec<ClosedTrade> = [10.0, -5.0, 20.0, -10.0].map(trade).to_vec();
        let stats = TradeStats::compute(&trades);
        assert_eq!(stats.trades, 4);
        assert_eq!(stats.wins, 2);
        assert_relative_eq!(stats.win_rate, 0.5);
        assert_relative_eq!(stats.net_pnl, 15.0);
        assert_relative_eq!(stats.gross_pnl, 23.0);
        assert_relative_eq!(stats.commission, 8.0);
        assert_relative_eq!(stats.profit_factor, 2.0);
        assert_relative_eq!(stats.avg_trade, 3.75);
        assert_relative_eq!(stats.max_drawdown, 10.0);
    }

    #[test]
    fn stats_edge_cases() {
        let empty = TradeStats::compute(&[]);
        assert_eq!(empty.trades, 0);
        assert_relative_eq!(empty.profit_factor, 0.0);
        let winners = TradeStats::compute(&[trade(5.0)]);
        assert!(winners.profit_factor.is_infinite());
        let loser = TradeStats::compute(&[trade(-5.0)]);
        assert_relative_eq!(loser.max_drawdown, 5.0);
    }
}
