//! Serializable parameter sets.
//!
//! A `ScanParams` value is everything that decides what the engine emits.
//! Its fingerprint identifies a parameter set in the change log.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::ScanError;
use crate::domain::gate::Gate;
use crate::domain::monitor::{Bias, DEFAULT_FAST_EMA, DEFAULT_SLOW_EMA};
use crate::domain::rule_parser;
use crate::domain::signal::{ScanEngine, Thresholds};
use crate::domain::trade_sim::SimConfig;
use crate::domain::vote::Voter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterParams {
    pub name: String,
    pub weight: u32,
    pub bullish: Option<String>,
    pub bearish: Option<String>,
}

impl VoterParams {
    pub fn to_voter(&self) -> Result<Voter, ScanError> {
        Voter::parse(
            self.name.clone(),
            self.weight,
            self.bullish.as_deref(),
            self.bearish.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateParams {
    Hours {
        start_hour: u32,
        end_hour: u32,
    },
    Weekdays {
        blocked: Vec<Weekday>,
    },
    Volatility {
        atr_period: usize,
        sma_period: usize,
        ratio: f64,
        min_pct: f64,
    },
    DivergenceCount {
        /// Indicator text, e.g. `RSI(14)`.
        source: String,
        pivot: usize,
        lookback: usize,
        window: usize,
        max: usize,
    },
    CrossAsset {
        symbol: String,
        ema_period: usize,
    },
}

impl GateParams {
    pub fn to_gate(&self) -> Result<Gate, ScanError> {
        let gate = match self {
            GateParams::Hours {
                start_hour,
                end_hour,
            } => Gate::Hours {
                start_hour: *start_hour,
                end_hour: *end_hour,
            },
            GateParams::Weekdays { blocked } => Gate::Weekdays {
                blocked: blocked.clone(),
            },
            GateParams::Volatility {
                atr_period,
                sma_period,
                ratio,
                min_pct,
            } => Gate::Volatility {
                atr_period: *atr_period,
                sma_period: *sma_period,
                ratio: *ratio,
                min_pct: *min_pct,
            },
            GateParams::DivergenceCount {
                source,
                pivot,
                lookback,
                window,
                max,
            } => Gate::DivergenceCount {
                source: rule_parser::parse_indicator(source)?,
                pivot: *pivot,
                lookback: *lookback,
                window: *window,
                max: *max,
            },
            GateParams::CrossAsset { symbol, ema_period } => Gate::CrossAsset {
                symbol: symbol.clone(),
                ema_period: *ema_period,
            },
        };
        Ok(gate)
    }
}

/// A reference shown on the checklist. Context never votes or blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextParams {
    /// Reference close above its EMA, e.g. yields rising.
    AboveEma {
        label: String,
        symbol: String,
        ema_period: usize,
        bias: Bias,
    },
    /// Reference trend agrees with the primary trend.
    TrendAligned { label: String, symbol: String },
}

impl ContextParams {
    pub fn symbol(&self) -> &str {
        match self {
            ContextParams::AboveEma { symbol, .. } | ContextParams::TrendAligned { symbol, .. } => {
                symbol
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ContextParams::AboveEma { label, .. } | ContextParams::TrendAligned { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub thresholds: Thresholds,
    /// Fewer bars than this is an insufficient-data error.
    pub min_bars: usize,
    pub voters: Vec<VoterParams>,
    pub gates: Vec<GateParams>,
    pub trend_fast: usize,
    pub trend_slow: usize,
    pub sim: SimConfig,
    /// Left out of the encoding when empty, so older fingerprints hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextParams>,
}

impl ScanParams {
    pub fn new(thresholds: Thresholds, voters: Vec<VoterParams>) -> Self {
        Self {
            thresholds,
            min_bars: 1,
            voters,
            gates: Vec::new(),
            trend_fast: DEFAULT_FAST_EMA,
            trend_slow: DEFAULT_SLOW_EMA,
            sim: SimConfig::default(),
            context: Vec::new(),
        }
    }

    /// Lowercase hex SHA-256 of the JSON encoding.
    ///
    /// Field order is fixed by the struct definitions, so equal parameter
    /// sets always hash the same.
    pub fn fingerprint(&self) -> Result<String, ScanError> {
        let json = serde_json::to_vec(self).map_err(|e| ScanError::ParamLog {
            reason: format!("cannot encode parameters: {}", e),
        })?;
        Ok(hex::encode(Sha256::digest(&json)))
    }

    pub fn build_engine(&self) -> Result<ScanEngine, ScanError> {
        let voters = self
            .voters
            .iter()
            .map(VoterParams::to_voter)
            .collect::<Result<Vec<_>, _>>()?;
        let gates = self
            .gates
            .iter()
            .map(GateParams::to_gate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScanEngine::new(voters, gates, self.thresholds))
    }
}

/// One line of the parameter change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamLogEntry {
    pub recorded_at: DateTime<Utc>,
    pub fingerprint: String,
    pub params: ScanParams,
}
