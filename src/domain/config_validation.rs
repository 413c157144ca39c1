//! Configuration validation.
//!
//! Reads the scan sections of an INI config into a [`ScanParams`], rejecting
//! missing or out-of-range values before anything runs. Rule texts are
//! parsed here too, so a bad voter fails at load time with its position.

use chrono::Weekday;

use crate::domain::error::ScanError;
use crate::domain::monitor::{Bias, DEFAULT_FAST_EMA, DEFAULT_SLOW_EMA};
use crate::domain::params::{ContextParams, GateParams, ScanParams, VoterParams};
use crate::domain::signal::Thresholds;
use crate::domain::trade_sim::SimConfig;
use crate::ports::config_port::ConfigPort;

pub const VOTER_PREFIX: &str = "vote:";
pub const GATE_PREFIX: &str = "gate:";
pub const CONTEXT_PREFIX: &str = "context:";

/// Validate and load every section that shapes the engine.
pub fn load_scan_params(config: &dyn ConfigPort) -> Result<ScanParams, ScanError> {
    let thresholds = validate_thresholds(config)?;
    let voters = load_voters(config)?;
    let gates = load_gates(config)?;
    let (trend_fast, trend_slow) = validate_trend(config)?;
    let params = ScanParams {
        thresholds,
        min_bars: count(config, "scan", "min_bars", 1, 1)?,
        voters,
        gates,
        trend_fast,
        trend_slow,
        sim: load_sim_config(config)?,
        context: load_context(config)?,
    };
    // surfaces rule parse errors at load time
    params.build_engine()?;
    Ok(params)
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), ScanError> {
    match config.get_string("data", "symbol") {
        Some(s) if !s.trim().is_empty() => {}
        _ => return Err(missing("data", "symbol")),
    }
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.as_str() {
        "csv" | "yahoo" => {}
        other => {
            return Err(invalid(
                "data",
                "source",
                format!("unknown data source '{}', expected csv or yahoo", other),
            ))
        }
    }
    count(config, "data", "max_cache_age_minutes", 30, 0)?;
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<Thresholds, ScanError> {
    if config.get_string("scan", "buy_threshold").is_none() {
        return Err(missing("scan", "buy_threshold"));
    }
    let buy = count(config, "scan", "buy_threshold", 1, 1)?;
    let sell = count(config, "scan", "sell_threshold", buy, 1)?;
    Ok(Thresholds {
        buy: to_u32("scan", "buy_threshold", buy)?,
        sell: to_u32("scan", "sell_threshold", sell)?,
    })
}

fn validate_trend(config: &dyn ConfigPort) -> Result<(usize, usize), ScanError> {
    let fast = count(config, "monitor", "fast_ema", DEFAULT_FAST_EMA, 1)?;
    let slow = count(config, "monitor", "slow_ema", DEFAULT_SLOW_EMA, 1)?;
    if fast >= slow {
        return Err(invalid(
            "monitor",
            "fast_ema",
            "fast_ema must be shorter than slow_ema".to_string(),
        ));
    }
    Ok((fast, slow))
}

fn load_voters(config: &dyn ConfigPort) -> Result<Vec<VoterParams>, ScanError> {
    let mut voters = Vec::new();
    for section in config.sections() {
        let Some(name) = section.strip_prefix(VOTER_PREFIX) else {
            continue;
        };
        let weight = count(config, &section, "weight", 1, 1)?;
        let bullish = non_empty(config, &section, "bullish");
        let bearish = non_empty(config, &section, "bearish");
        if bullish.is_none() && bearish.is_none() {
            return Err(missing(&section, "bullish"));
        }
        voters.push(VoterParams {
            name: name.to_string(),
            weight: to_u32(&section, "weight", weight)?,
            bullish,
            bearish,
        });
    }
    if voters.is_empty() {
        return Err(ScanError::RuleInvalid {
            reason: format!("no [{}<name>] sections configured", VOTER_PREFIX),
        });
    }
    let total: u64 = voters.iter().map(|v| u64::from(v.weight)).sum();
    if total > u64::from(u32::MAX) {
        let section = format!("{}{}", VOTER_PREFIX, voters[voters.len() - 1].name);
        return Err(invalid(
            &section,
            "weight",
            format!("total voter weight {} exceeds {}", total, u32::MAX),
        ));
    }
    Ok(voters)
}

fn load_gates(config: &dyn ConfigPort) -> Result<Vec<GateParams>, ScanError> {
    let mut gates = Vec::new();
    for section in config.sections() {
        if section.starts_with(GATE_PREFIX) && config.get_bool(&section, "enabled", true) {
            gates.push(load_gate(config, &section)?);
        }
    }
    Ok(gates)
}

fn load_gate(config: &dyn ConfigPort, section: &str) -> Result<GateParams, ScanError> {
    let kind = non_empty(config, section, "kind").ok_or_else(|| missing(section, "kind"))?;
    let gate = match kind.as_str() {
        "hours" => {
            let start_hour = hour(config, section, "start_hour", 0)?;
            let end_hour = hour(config, section, "end_hour", 23)?;
            GateParams::Hours {
                start_hour,
                end_hour,
            }
        }
        "weekdays" => {
            let text = non_empty(config, section, "blocked")
                .ok_or_else(|| missing(section, "blocked"))?;
            let blocked = text
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<Weekday>().map_err(|_| {
                        invalid(section, "blocked", format!("unknown weekday '{}'", s))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            GateParams::Weekdays { blocked }
        }
        "volatility" => GateParams::Volatility {
            atr_period: count(config, section, "atr_period", 14, 1)?,
            sma_period: count(config, section, "sma_period", 50, 1)?,
            ratio: non_negative(config, section, "ratio", 0.90)?,
            min_pct: non_negative(config, section, "min_pct", 0.0015)?,
        },
        "divergence_count" => GateParams::DivergenceCount {
            source: non_empty(config, section, "source")
                .ok_or_else(|| missing(section, "source"))?,
            pivot: count(config, section, "pivot", 3, 1)?,
            lookback: count(config, section, "lookback", 30, 1)?,
            window: count(config, section, "window", 10, 1)?,
            max: count(config, section, "max", 1, 0)?,
        },
        "cross_asset" => GateParams::CrossAsset {
            symbol: non_empty(config, section, "symbol")
                .ok_or_else(|| missing(section, "symbol"))?,
            ema_period: count(config, section, "ema_period", 12, 1)?,
        },
        other => {
            return Err(invalid(
                section,
                "kind",
                format!(
                    "unknown gate kind '{}', expected hours, weekdays, volatility, divergence_count or cross_asset",
                    other
                ),
            ))
        }
    };
    Ok(gate)
}

fn load_context(config: &dyn ConfigPort) -> Result<Vec<ContextParams>, ScanError> {
    let mut context = Vec::new();
    for section in config.sections() {
        let Some(name) = section.strip_prefix(CONTEXT_PREFIX) else {
            continue;
        };
        if !config.get_bool(&section, "enabled", true) {
            continue;
        }
        let symbol =
            non_empty(config, &section, "symbol").ok_or_else(|| missing(&section, "symbol"))?;
        let label = non_empty(config, &section, "label").unwrap_or_else(|| name.to_string());
        let kind = non_empty(config, &section, "kind").unwrap_or_else(|| "above_ema".to_string());
        let item = match kind.as_str() {
            "above_ema" => {
                let bias = match non_empty(config, &section, "bias").as_deref() {
                    None | Some("bear") => Bias::Bear,
                    Some("bull") => Bias::Bull,
                    Some(other) => {
                        return Err(invalid(
                            &section,
                            "bias",
                            format!("unknown bias '{}', expected bull or bear", other),
                        ))
                    }
                };
                ContextParams::AboveEma {
                    label,
                    symbol,
                    ema_period: count(config, &section, "ema_period", 12, 1)?,
                    bias,
                }
            }
            "trend_aligned" => ContextParams::TrendAligned { label, symbol },
            other => {
                return Err(invalid(
                    &section,
                    "kind",
                    format!(
                        "unknown context kind '{}', expected above_ema or trend_aligned",
                        other
                    ),
                ))
            }
        };
        context.push(item);
    }
    Ok(context)
}

pub fn load_sim_config(config: &dyn ConfigPort) -> Result<SimConfig, ScanError> {
    let d = SimConfig::default();
    let trailing_stop_atr_mult = match non_empty(config, "sim", "trailing_stop_atr_mult") {
        None => d.trailing_stop_atr_mult,
        Some(s) if s.eq_ignore_ascii_case("none") => None,
        Some(_) => Some(non_negative(config, "sim", "trailing_stop_atr_mult", 0.0)?),
    };
    Ok(SimConfig {
        stop_atr_mult: non_negative(config, "sim", "stop_atr_mult", d.stop_atr_mult)?,
        take_atr_mult: non_negative(config, "sim", "take_atr_mult", d.take_atr_mult)?,
        trailing_stop_pct: non_negative(config, "sim", "trailing_stop_pct", d.trailing_stop_pct)?,
        trailing_stop_atr_mult,
        min_hold_bars: count(config, "sim", "min_hold_bars", d.min_hold_bars, 0)?,
        exit_confirm_bars: count(config, "sim", "exit_confirm_bars", d.exit_confirm_bars, 1)?,
        commission_entry: non_negative(config, "sim", "commission_entry", d.commission_entry)?,
        commission_exit: non_negative(config, "sim", "commission_exit", d.commission_exit)?,
        atr_period: count(config, "sim", "atr_period", d.atr_period, 1)?,
        allow_shorting: config.get_bool("sim", "allow_shorting", d.allow_shorting),
    })
}

fn missing(section: &str, key: &str) -> ScanError {
    ScanError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: String) -> ScanError {
    ScanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Integer key that must be at least `min`. Present but non-numeric values
/// are rejected rather than silently defaulted.
fn count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize, ScanError> {
    let value = match non_empty(config, section, key) {
        None => return Ok(default),
        Some(text) => text
            .parse::<i64>()
            .map_err(|_| invalid(section, key, format!("{} must be an integer", key)))?,
    };
    if value < min as i64 {
        return Err(invalid(
            section,
            key,
            format!("{} must be at least {}", key, min),
        ));
    }
    Ok(value as usize)
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ScanError> {
    let value = match non_empty(config, section, key) {
        None => return Ok(default),
        Some(text) => text
            .parse::<f64>()
            .map_err(|_| invalid(section, key, format!("{} must be a number", key)))?,
    };
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(
            section,
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(value)
}

fn hour(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<u32, ScanError> {
    let value = count(config, section, key, default, 0)?;
    if value > 23 {
        return Err(invalid(section, key, format!("{} must be between 0 and 23", key)));
    }
    to_u32(section, key, value)
}

fn to_u32(section: &str, key: &str, value: usize) -> Result<u32, ScanError> {
    u32::try_from(value).map_err(|_| invalid(section, key, format!("{} is too large", key)))
}
