//! Latest-bar status, change alerts and the checklist view used by `watch`
//! and `status`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bar::{Bar, BarSeries};
use crate::domain::gate::align_backward;
use crate::domain::indicator_helpers::ema;
use crate::domain::params::ContextParams;
use crate::domain::signal::{Signal, SignalEvaluation};
use crate::domain::vote::Voter;

pub const DEFAULT_FAST_EMA: usize = 20;
pub const DEFAULT_SLOW_EMA: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bull,
    Bear,
    Flat,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bull => write!(f, "BULL"),
            Trend::Bear => write!(f, "BEAR"),
            Trend::Flat => write!(f, "FLAT"),
        }
    }
}

impl Trend {
    /// Trend on the last bar: fast EMA above slow is BULL, below is BEAR.
    /// FLAT while either EMA is still warming up.
    pub fn latest(bars: &[Bar], fast: usize, slow: usize) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last = |values: Vec<Option<f64>>| values.last().copied().flatten();
        match (last(ema(&closes, fast)), last(ema(&closes, slow))) {
            (Some(f), Some(s)) if f > s => Trend::Bull,
            (Some(f), Some(s)) if f < s => Trend::Bear,
            _ => Trend::Flat,
        }
    }
}

/// Which side a true context reading favours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bull,
    Bear,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Bull => write!(f, "Bull"),
            Bias::Bear => write!(f, "Bear"),
        }
    }
}

/// A context row. `value` is `None` when the reference has no bar at or
/// before the last primary bar, or its EMA is still warming up.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextState {
    pub label: String,
    pub value: Option<bool>,
    pub bias: Option<Bias>,
}

/// Read every context reference as of the last primary bar.
pub fn evaluate_context(
    context: &[ContextParams],
    bars: &[Bar],
    references: &HashMap<String, BarSeries>,
    trend: Trend,
    fast: usize,
    slow: usize,
) -> Vec<ContextState> {
    context
        .iter()
        .map(|item| {
            let aligned = references.get(item.symbol()).and_then(|reference| {
                let j = align_backward(bars, reference.bars()).last().copied().flatten()?;
                Some((reference, j))
            });
            let (value, bias) = match item {
                ContextParams::AboveEma {
                    ema_period, bias, ..
                } => {
                    let value = aligned.and_then(|(reference, j)| {
                        let closes = reference.closes();
                        let level = ema(&closes, *ema_period)[j]?;
                        Some(closes[j] > level)
                    });
                    (value, Some(*bias))
                }
                ContextParams::TrendAligned { .. } => {
                    let value = aligned.map(|(reference, j)| {
                        let other = Trend::latest(&reference.bars()[..=j], fast, slow);
                        trend != Trend::Flat && other == trend
                    });
                    (value, None)
                }
            };
            ContextState {
                label: item.label().to_string(),
                value,
                bias,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoterState {
    pub name: String,
    pub bullish: bool,
    pub bearish: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub trend: Trend,
    pub buy_score: u32,
    pub sell_score: u32,
    pub conviction: f64,
    pub raw: Signal,
    pub signal: Signal,
    pub blocked: bool,
    pub reasons: Vec<String>,
    pub voters: Vec<VoterState>,
    pub context: Vec<ContextState>,
}

impl Status {
    pub fn from_evaluation(symbol: &str, evaluation: &SignalEvaluation, trend: Trend) -> Self {
        let mut voters: Vec<VoterState> = Vec::new();
        for name in evaluation.bullish.iter().chain(&evaluation.bearish) {
            if !voters.iter().any(|v| &v.name == name) {
                voters.push(VoterState {
                    name: name.clone(),
                    bullish: evaluation.bullish.contains(name),
                    bearish: evaluation.bearish.contains(name),
                });
            }
        }
        Self {
            symbol: symbol.to_string(),
            timestamp: evaluation.timestamp,
            close: evaluation.close,
            trend,
            buy_score: evaluation.buy_score,
            sell_score: evaluation.sell_score,
            conviction: evaluation.conviction,
            raw: evaluation.raw,
            signal: evaluation.signal,
            blocked: evaluation.blocked,
            reasons: evaluation.reasons.clone(),
            voters,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<ContextState>) -> Self {
        self.context = context;
        self
    }

    /// List every configured voter, including those that stayed silent.
    pub fn with_voters(mut self, voters: &[Voter]) -> Self {
        let mut states = Vec::with_capacity(voters.len());
        for voter in voters {
            let found = self.voters.iter().find(|v| v.name == voter.name);
            states.push(VoterState {
                name: voter.name.clone(),
                bullish: found.is_some_and(|v| v.bullish),
                bearish: found.is_some_and(|v| v.bearish),
            });
        }
        self.voters = states;
        self
    }

    /// One-line summary printed on every poll.
    pub fn line(&self) -> String {
        let mut line = format!(
            "[status] {} | {} | {} | close={:.4} buy={} sell={} | {}",
            self.symbol,
            self.timestamp.to_rfc3339(),
            self.trend,
            self.close,
            self.buy_score,
            self.sell_score,
            self.signal,
        );
        if self.blocked {
            line.push_str(&format!(" (blocked {}: {})", self.raw, self.reasons.join("; ")));
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    TrendFlip { from: Trend, to: Trend },
    NewSignal { signal: Signal },
    BlockChanged { blocked: bool },
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertEvent::TrendFlip { from, to } => write!(f, "TREND_FLIP {}→{}", from, to),
            AlertEvent::NewSignal { signal } => write!(f, "{}", signal),
            AlertEvent::BlockChanged { blocked: true } => write!(f, "BLOCKED"),
            AlertEvent::BlockChanged { blocked: false } => write!(f, "UNBLOCKED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub events: Vec<AlertEvent>,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ALERT] {} | {}", self.symbol, self.timestamp.to_rfc3339())?;
        for event in &self.events {
            write!(f, " | {}", event)?;
        }
        write!(f, " | close={:.4}", self.close)
    }
}

/// Compare two consecutive polls.
///
/// A BUY/SELL is reported when it differs from the previous poll or sits on
/// a newer bar. Trend flips and block changes need a previous poll.
pub fn detect_alert(prev: Option<&Status>, curr: &Status) -> Option<Alert> {
    let mut events = Vec::new();

    if let Some(p) = prev {
        if p.trend != curr.trend {
            events.push(AlertEvent::TrendFlip {
                from: p.trend,
                to: curr.trend,
            });
        }
    }

    if curr.signal != Signal::Neutral {
        let fresh = prev.is_none_or(|p| p.signal != curr.signal || p.timestamp != curr.timestamp);
        if fresh {
            events.push(AlertEvent::NewSignal {
                signal: curr.signal,
            });
        }
    }

    if let Some(p) = prev {
        if p.blocked != curr.blocked {
            events.push(AlertEvent::BlockChanged {
                blocked: curr.blocked,
            });
        }
    }

    if events.is_empty() {
        return None;
    }
    Some(Alert {
        symbol: curr.symbol.clone(),
        timestamp: curr.timestamp,
        close: curr.close,
        events,
    })
}

/// `True (Bull)` / `False (Bear)` style cell.
fn cell(value: bool, bias: Option<&str>) -> String {
    match (value, bias) {
        (true, Some(b)) => format!("True ({})", b),
        (false, Some("Bull")) => "False (Bear)".to_string(),
        (false, Some(_)) => "False (Bull)".to_string(),
        (true, None) => "True".to_string(),
        (false, None) => "False".to_string(),
    }
}

pub fn render_checklist(status: &Status) -> String {
    let mut rows: Vec<(String, String)> = vec![
        ("Trend BULL".into(), cell(status.trend == Trend::Bull, Some("Bull"))),
        ("Trend BEAR".into(), cell(status.trend == Trend::Bear, Some("Bear"))),
    ];
    for voter in &status.voters {
        rows.push((format!("{} bullish", voter.name), cell(voter.bullish, Some("Bull"))));
        rows.push((format!("{} bearish", voter.name), cell(voter.bearish, Some("Bear"))));
    }
    for item in &status.context {
        let value = match item.value {
            Some(v) => cell(v, item.bias.map(|b| b.to_string()).as_deref()),
            None => "N/A".to_string(),
        };
        rows.push((item.label.clone(), value));
    }
    rows.push(("Blocked by gates".into(), cell(status.blocked, None)));
    rows.push(("BUY signal".into(), cell(status.signal == Signal::Buy, Some("Bull"))));
    rows.push(("SELL signal".into(), cell(status.signal == Signal::Sell, Some("Bear"))));

    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0).max(9);
    let mut out = String::new();
    out.push_str(&format!("  {} STATUS CHECKLIST\n", status.symbol));
    out.push_str(&format!("  {}\n\n", status.timestamp.to_rfc3339()));
    out.push_str(&format!("  {:<width$}  TRUE/FALSE (Bull/Bear)\n", "INDICATOR"));
    for (label, value) in &rows {
        out.push_str(&format!("  {:<width$}  {}\n", label, value));
    }
    out.push_str(&format!(
        "\n  Close={:.4}  buy={}  sell={}  conviction={:.2}\n",
        status.close, status.buy_score, status.sell_score, status.conviction
    ));
    for reason in &status.reasons {
        out.push_str(&format!("  gate: {}\n", reason));
    }
    out
}
