//! CLI definition and dispatch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::adapters::console_alert_adapter::ConsoleAlertAdapter;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::jsonl_param_log::JsonlParamLog;
use crate::adapters::webhook_alert_adapter::WebhookAlertAdapter;
use crate::adapters::yahoo_adapter::YahooSettings;
use crate::domain::bar::BarSeries;
use crate::domain::config_validation::{
    load_scan_params, validate_data_config, CONTEXT_PREFIX, GATE_PREFIX,
};
use crate::domain::error::ScanError;
use crate::domain::monitor::{detect_alert, evaluate_context, render_checklist, Status, Trend};
use crate::domain::params::ScanParams;
use crate::domain::replay::{replay, ReplayReport, DEFAULT_HORIZONS};
use crate::domain::signal::{ScanEngine, Signal, SignalEvaluation};
use crate::domain::trade_sim::{simulate, SimResult, TradeStats};
use crate::ports::alert_port::AlertPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::param_log_port::ParamLogPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "signalscan", about = "Weighted-vote signal scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate the configured voters and print the latest signal
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Write every evaluation to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print every bar, not only the latest
        #[arg(long)]
        all: bool,
    },
    /// Replay signals against forward returns and simulate trades
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_HORIZONS.to_vec())]
        horizons: Vec<usize>,
    },
    /// Poll for new bars and alert on changes
    Watch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        sleep_seconds: Option<u64>,
        /// Stop after this many polls
        #[arg(long)]
        iterations: Option<u64>,
        #[arg(long)]
        beep: bool,
    },
    /// Print the checklist for the latest bar
    Status {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration and record its parameter set
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available from the data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Scan {
            config,
            symbol,
            output,
            all,
        } => run_scan(&config, symbol.as_deref(), output.as_deref(), all),
        Command::Backtest {
            config,
            symbol,
            horizons,
        } => run_backtest(&config, symbol.as_deref(), &horizons),
        Command::Watch {
            config,
            symbol,
            sleep_seconds,
            iterations,
            beep,
        } => run_watch(&config, symbol.as_deref(), sleep_seconds, iterations, beep),
        Command::Status { config, symbol } => run_status(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// A loaded and validated config with the engine it describes.
pub struct Session {
    pub config: FileConfigAdapter,
    pub params: ScanParams,
    pub engine: ScanEngine,
    pub data: Box<dyn DataPort>,
    pub symbol: String,
}

impl Session {
    pub fn open(config_path: &Path, symbol_override: Option<&str>) -> Result<Self, ScanError> {
        let config = FileConfigAdapter::from_file(config_path)?;
        let params = load_scan_params(&config)?;
        let engine = params.build_engine()?;
        let symbol = resolve_symbol(symbol_override, &config)?;
        let data = build_data_port(&config, Some(&symbol))?;
        Ok(Self {
            config,
            params,
            engine,
            data,
            symbol,
        })
    }

    /// Fetch the primary series and every reference the gates and context
    /// rows read.
    pub fn load(&self) -> Result<(BarSeries, HashMap<String, BarSeries>), ScanError> {
        load_series(self.data.as_ref(), &self.symbol, &self.params, &self.engine)
    }

    pub fn evaluate(&self) -> Result<(BarSeries, Vec<SignalEvaluation>), ScanError> {
        let (series, references) = self.load()?;
        let evaluations = self.engine.evaluate(&series, &references)?;
        Ok((series, evaluations))
    }

    /// Status of the last evaluated bar.
    pub fn status(&self) -> Result<Status, ScanError> {
        let (series, references) = self.load()?;
        let evaluations = self.engine.evaluate(&series, &references)?;
        latest_status(&series, &evaluations, &references, &self.params, &self.engine)
    }
}

pub fn resolve_symbol(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, ScanError> {
    symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("data", "symbol"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ScanError::ConfigMissing {
            section: "data".to_string(),
            key: "symbol".to_string(),
        })
}

fn config_list(config: &dyn ConfigPort, section: &str, key: &str) -> Vec<String> {
    config
        .get_string(section, key)
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Fallback lists per symbol: `[data] fallback_symbols` belongs to the
/// primary symbol, and each cross-asset gate or context section may carry
/// its own `fallback_symbols`.
pub fn fallback_map(config: &dyn ConfigPort, primary: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    let configured = config.get_string("data", "symbol");
    if let Some(primary) = primary.or(configured.as_deref()) {
        let list = config_list(config, "data", "fallback_symbols");
        if !list.is_empty() {
            map.insert(primary.trim().to_string(), list);
        }
    }
    for section in config.sections() {
        let reference = section.starts_with(CONTEXT_PREFIX)
            || (section.starts_with(GATE_PREFIX)
                && config.get_string(&section, "kind").as_deref().map(str::trim) == Some("cross_asset"));
        if !reference {
            continue;
        }
        let Some(symbol) = config.get_string(&section, "symbol") else {
            continue;
        };
        let list = config_list(config, &section, "fallback_symbols");
        if !list.is_empty() {
            map.entry(symbol.trim().to_string()).or_insert(list);
        }
    }
    map
}

pub fn yahoo_settings(config: &dyn ConfigPort, primary: Option<&str>) -> YahooSettings {
    let d = YahooSettings::default();
    YahooSettings {
        interval: config.get_string("data", "interval").unwrap_or(d.interval),
        range: config.get_string("data", "range").unwrap_or(d.range),
        fallbacks: fallback_map(config, primary),
        max_cache_age_minutes: config.get_int("data", "max_cache_age_minutes", d.max_cache_age_minutes),
        ..d
    }
}

/// Data source for `[data] source`. `primary` overrides `[data] symbol` as
/// the owner of the primary fallback list.
pub fn build_data_port(
    config: &dyn ConfigPort,
    primary: Option<&str>,
) -> Result<Box<dyn DataPort>, ScanError> {
    validate_data_config(config)?;
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    if source == "yahoo" {
        return build_yahoo(config, primary);
    }
    let directory = config
        .get_string("data", "directory")
        .unwrap_or_else(|| "data".to_string());
    Ok(Box::new(CsvAdapter::new(PathBuf::from(directory))))
}

#[cfg(feature = "yahoo")]
fn build_yahoo(config: &dyn ConfigPort, primary: Option<&str>) -> Result<Box<dyn DataPort>, ScanError> {
    use crate::adapters::yahoo_adapter::YahooAdapter;

    let cache_dir = config
        .get_string("data", "cache_dir")
        .unwrap_or_else(|| "cache".to_string());
    let adapter = YahooAdapter::http(
        yahoo_settings(config, primary),
        CsvAdapter::new(PathBuf::from(cache_dir)),
    )?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "yahoo"))]
fn build_yahoo(_config: &dyn ConfigPort, _primary: Option<&str>) -> Result<Box<dyn DataPort>, ScanError> {
    Err(ScanError::ConfigInvalid {
        section: "data".to_string(),
        key: "source".to_string(),
        reason: "source 'yahoo' needs a build with the yahoo feature".to_string(),
    })
}

pub fn load_series(
    data: &dyn DataPort,
    symbol: &str,
    params: &ScanParams,
    engine: &ScanEngine,
) -> Result<(BarSeries, HashMap<String, BarSeries>), ScanError> {
    let series = data.fetch_bars(symbol, None, None)?;
    if series.is_empty() {
        return Err(ScanError::NoData {
            symbol: symbol.to_string(),
        });
    }
    if series.len() < params.min_bars {
        return Err(ScanError::InsufficientData {
            symbol: symbol.to_string(),
            bars: series.len(),
            minimum: params.min_bars,
        });
    }

    let mut references = HashMap::new();
    for reference in engine.reference_symbols() {
        match data.fetch_bars(&reference, None, None) {
            Ok(bars) if !bars.is_empty() => {
                references.insert(reference, bars);
            }
            Ok(_) => tracing::warn!(symbol = %reference, "reference series is empty, gate left open"),
            Err(e) => {
                tracing::warn!(symbol = %reference, error = %e, "reference data unavailable, gate left open")
            }
        }
    }
    for item in &params.context {
        let symbol = item.symbol();
        if references.contains_key(symbol) {
            continue;
        }
        match data.fetch_bars(symbol, None, None) {
            Ok(bars) if !bars.is_empty() => {
                references.insert(symbol.to_string(), bars);
            }
            Ok(_) => tracing::warn!(symbol, "context series is empty, shown as N/A"),
            Err(e) => tracing::warn!(symbol, error = %e, "context data unavailable, shown as N/A"),
        }
    }
    Ok((series, references))
}

pub fn latest_status(
    series: &BarSeries,
    evaluations: &[SignalEvaluation],
    references: &HashMap<String, BarSeries>,
    params: &ScanParams,
    engine: &ScanEngine,
) -> Result<Status, ScanError> {
    let last = evaluations.last().ok_or_else(|| ScanError::NoData {
        symbol: series.symbol().to_string(),
    })?;
    let trend = Trend::latest(series.bars(), params.trend_fast, params.trend_slow);
    let context = evaluate_context(
        &params.context,
        series.bars(),
        references,
        trend,
        params.trend_fast,
        params.trend_slow,
    );
    Ok(Status::from_evaluation(series.symbol(), last, trend)
        .with_voters(&engine.voters)
        .with_context(context))
}

pub fn evaluation_line(symbol: &str, eval: &SignalEvaluation) -> String {
    let mut line = format!(
        "{} {} close={:.4} buy={}/{} sell={}/{} conviction={:.2} {}",
        eval.timestamp.to_rfc3339(),
        symbol,
        eval.close,
        eval.buy_score,
        eval.threshold.buy,
        eval.sell_score,
        eval.threshold.sell,
        eval.conviction,
        eval.signal,
    );
    if eval.blocked {
        line.push_str(&format!(" (blocked {}: {})", eval.raw, eval.reasons.join("; ")));
    }
    line
}

/// Append the parameter set to `[params] log` when one is configured.
pub fn record_params(config: &dyn ConfigPort, params: &ScanParams) -> Result<Option<bool>, ScanError> {
    let Some(path) = config.get_string("params", "log").filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };
    JsonlParamLog::new(path.trim()).append(params).map(Some)
}

fn run_scan(
    config_path: &Path,
    symbol: Option<&str>,
    output: Option<&Path>,
    all: bool,
) -> Result<(), ScanError> {
    let session = Session::open(config_path, symbol)?;
    let (series, evaluations) = session.evaluate()?;

    let shown = if all {
        &evaluations[..]
    } else {
        &evaluations[evaluations.len().saturating_sub(1)..]
    };
    for eval in shown {
        println!("{}", evaluation_line(series.symbol(), eval));
    }

    if let Some(path) = output {
        let path = path.to_string_lossy();
        CsvReportAdapter::new().write_evaluations(series.symbol(), &evaluations, &path)?;
        eprintln!("Report written to {}", path);
    }
    Ok(())
}

fn print_replay(report: &ReplayReport, horizons: &[usize]) {
    println!(
        "Bars: {}  BUY: {}  SELL: {}  blocked: {}",
        report.bars, report.buy_signals, report.sell_signals, report.blocked_signals
    );
    println!();
    println!(
        "{:<8} {:>7} {:>7} {:>7} {:>9} {:>11} {:>11}",
        "signal", "horizon", "count", "wins", "win rate", "avg ret", "avg dir"
    );
    for signal in [Signal::Buy, Signal::Sell] {
        for &h in horizons {
            if let Some(s) = report.get(signal, h) {
                println!(
                    "{:<8} {:>7} {:>7} {:>7} {:>8.1}% {:>10.4}% {:>10.4}%",
                    signal.to_string(),
                    h,
                    s.count,
                    s.wins,
                    s.win_rate * 100.0,
                    s.avg_return * 100.0,
                    s.avg_directional_return * 100.0
                );
            }
        }
    }

    if report.blocked_signals > 0 {
        println!();
        println!("Blocked signals (by raw signal):");
        for signal in [Signal::Buy, Signal::Sell] {
            for &h in horizons {
                if let Some(s) = report.get_blocked(signal, h) {
                    println!(
                        "{:<8} {:>7} {:>7} {:>7} {:>8.1}% {:>10.4}% {:>10.4}%",
                        signal.to_string(),
                        h,
                        s.count,
                        s.wins,
                        s.win_rate * 100.0,
                        s.avg_return * 100.0,
                        s.avg_directional_return * 100.0
                    );
                }
            }
        }
    }
}

fn print_trades(result: &SimResult) {
    let stats = TradeStats::compute(&result.trades);
    println!();
    println!("Trades: {}  wins: {}  win rate: {:.1}%", stats.trades, stats.wins, stats.win_rate * 100.0);
    println!(
        "Gross: {:.4}  commission: {:.4}  net: {:.4}  avg trade: {:.4}",
        stats.gross_pnl, stats.commission, stats.net_pnl, stats.avg_trade
    );
    println!(
        "Profit factor: {:.2}  max drawdown: {:.4}",
        stats.profit_factor, stats.max_drawdown
    );
    for trade in &result.trades {
        println!(
            "  {:?} {} -> {} entry={:.4} exit={:.4} net={:.4} ({:?})",
            trade.side,
            trade.entry_time.to_rfc3339(),
            trade.exit_time.to_rfc3339(),
            trade.entry_price,
            trade.exit_price,
            trade.net_pnl,
            trade.exit_reason
        );
    }
    if let Some(open) = &result.open {
        println!(
            "  open {:?} since {} entry={:.4}",
            open.side,
            open.entry_time.to_rfc3339(),
            open.entry_price
        );
    }
}

fn run_backtest(config_path: &Path, symbol: Option<&str>, horizons: &[usize]) -> Result<(), ScanError> {
    let session = Session::open(config_path, symbol)?;
    record_params(&session.config, &session.params)?;
    let (series, evaluations) = session.evaluate()?;

    eprintln!("Backtest {}: {} bars", series.symbol(), series.len());
    let report = replay(&evaluations, horizons);
    print_replay(&report, horizons);

    let result = simulate(series.bars(), &evaluations, &session.params.sim);
    print_trades(&result);
    Ok(())
}

fn alert_ports(config: &dyn ConfigPort, beep: bool) -> Result<Vec<Box<dyn AlertPort>>, ScanError> {
    let beep = beep || config.get_bool("monitor", "beep", false);
    let mut ports: Vec<Box<dyn AlertPort>> = vec![Box::new(ConsoleAlertAdapter::new(beep))];
    if let Some(url) = config
        .get_string("monitor", "webhook_url")
        .filter(|u| !u.trim().is_empty())
    {
        ports.push(Box::new(WebhookAlertAdapter::new(url.trim())?));
    }
    Ok(ports)
}

fn run_watch(
    config_path: &Path,
    symbol: Option<&str>,
    sleep_seconds: Option<u64>,
    iterations: Option<u64>,
    beep: bool,
) -> Result<(), ScanError> {
    let session = Session::open(config_path, symbol)?;
    record_params(&session.config, &session.params)?;
    let alerts = alert_ports(&session.config, beep)?;

    let sleep = sleep_seconds
        .unwrap_or_else(|| session.config.get_int("monitor", "sleep_seconds", 60).max(0) as u64);
    let print_every = session.config.get_int("monitor", "print_status_every", 1).max(0) as u64;

    tracing::info!(symbol = %session.symbol, sleep_seconds = sleep, "watching");
    let mut previous: Option<Status> = None;
    let mut poll: u64 = 0;
    loop {
        poll += 1;
        match session.status() {
            Ok(status) => {
                if let Some(alert) = detect_alert(previous.as_ref(), &status) {
                    for port in &alerts {
                        if let Err(e) = port.send(&alert) {
                            tracing::error!(error = %e, "alert delivery failed");
                        }
                    }
                }
                if print_every > 0 && (poll - 1) % print_every == 0 {
                    println!("{}", status.line());
                }
                previous = Some(status);
            }
            Err(e) => tracing::error!(error = %e, "poll failed"),
        }

        if iterations.is_some_and(|n| poll >= n) {
            break;
        }
        std::thread::sleep(Duration::from_secs(sleep));
    }
    Ok(())
}

fn run_status(config_path: &Path, symbol: Option<&str>) -> Result<(), ScanError> {
    let session = Session::open(config_path, symbol)?;
    let status = session.status()?;
    print!("{}", render_checklist(&status));
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ScanError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;
    validate_data_config(&config)?;
    let params = load_scan_params(&config)?;
    let engine = params.build_engine()?;

    println!(
        "Thresholds: buy >= {}  sell >= {}  (max score {})",
        params.thresholds.buy,
        params.thresholds.sell,
        engine.max_score()
    );
    println!("\nVoters:");
    for voter in &engine.voters {
        println!("  {} (weight {})", voter.name, voter.weight);
        if let Some(rule) = &voter.bullish {
            println!("    bullish: {}", rule);
        }
        if let Some(rule) = &voter.bearish {
            println!("    bearish: {}", rule);
        }
    }

    if !engine.gates.is_empty() {
        println!("\nGates:");
        for gate in &engine.gates {
            println!("  {}", gate);
        }
    }

    let mut indicators: Vec<String> = engine
        .required_indicators()
        .iter()
        .map(|i| i.to_string())
        .collect();
    indicators.sort();
    println!("\nIndicators: {}", indicators.join(", "));

    let fingerprint = params.fingerprint()?;
    println!("Fingerprint: {}", fingerprint);
    match record_params(&config, &params)? {
        Some(true) => eprintln!("Parameter set recorded"),
        Some(false) => eprintln!("Parameter set unchanged"),
        None => {}
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), ScanError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let data = build_data_port(&config, None)?;
    let symbols = data.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), ScanError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let data = build_data_port(&config, symbol)?;
    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => data.list_symbols()?,
    };

    println!("{:<12} {:<26} {:<26} {:>8}", "Symbol", "First", "Last", "Bars");
    for symbol in &symbols {
        match data.get_data_range(symbol)? {
            Some((first, last, count)) => println!(
                "{:<12} {:<26} {:<26} {:>8}",
                symbol,
                first.to_rfc3339(),
                last.to_rfc3339(),
                count
            ),
            None => println!("{:<12} (no data)", symbol),
        }
    }
    Ok(())
}
