//! Yahoo chart API data adapter.
//!
//! Per symbol, in order: a cache file younger than the maximum cache age,
//! up to `retries` downloads with exponential backoff, then the stale cache
//! file. When all of that fails, the next fallback configured for the
//! requested symbol is tried the same way. Successful downloads are written
//! to the cache.
//!
//! The HTTP client sits behind [`ChartClient`]; the `yahoo` feature provides
//! the `reqwest` implementation. Response parsing is always available.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::domain::bar::{Bar, BarSeries};
use crate::domain::error::ScanError;
use crate::ports::data_port::DataPort;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Raw chart download.
pub trait ChartClient {
    fn get_chart(&self, symbol: &str, interval: &str, range: &str) -> Result<String, String>;
}

#[derive(Debug, Clone)]
pub struct YahooSettings {
    /// Yahoo interval, e.g. `60m`.
    pub interval: String,
    /// Yahoo range, e.g. `90d`.
    pub range: String,
    /// Replacement symbols per requested symbol, tried in order.
    pub fallbacks: HashMap<String, Vec<String>>,
    pub max_cache_age_minutes: i64,
    pub retries: usize,
    /// First retry delay; doubles on every failed attempt.
    pub backoff: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            interval: "60m".to_string(),
            range: "90d".to_string(),
            fallbacks: HashMap::new(),
            max_cache_age_minutes: 30,
            retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn data_error(reason: impl Into<String>) -> ScanError {
    ScanError::DataSource {
        reason: reason.into(),
    }
}

/// Turn a chart API response into bars.
///
/// Rows missing any price are skipped, a missing volume counts as zero, and
/// a repeated trailing timestamp (the live bar) keeps the first occurrence.
pub fn parse_chart_response(symbol: &str, json: &str) -> Result<BarSeries, ScanError> {
    let response: ChartResponse = serde_json::from_str(json)
        .map_err(|e| data_error(format!("invalid chart response for {}: {}", symbol, e)))?;

    if let Some(error) = response.chart.error {
        return Err(data_error(format!(
            "chart API error for {} [{}]: {}",
            symbol, error.code, error.description
        )));
    }

    let data = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ScanError::NoData {
            symbol: symbol.to_string(),
        })?;
    let quote = data.indicators.quote.first().ok_or_else(|| ScanError::NoData {
        symbol: symbol.to_string(),
    })?;

    let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();
    let mut series = BarSeries::new(symbol);
    for (i, &secs) in data.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            continue;
        };
        let Some(timestamp) = DateTime::<Utc>::from_timestamp(secs, 0) else {
            continue;
        };
        if series.last().is_some_and(|last| timestamp <= last.timestamp) {
            continue;
        }
        series.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: at(&quote.volume, i).unwrap_or(0.0),
        })?;
    }
    Ok(series)
}

pub struct YahooAdapter {
    settings: YahooSettings,
    cache: CsvAdapter,
    client: Box<dyn ChartClient>,
}

impl YahooAdapter {
    pub fn new(settings: YahooSettings, cache: CsvAdapter, client: Box<dyn ChartClient>) -> Self {
        Self {
            settings,
            cache,
            client,
        }
    }

    #[cfg(feature = "yahoo")]
    pub fn http(settings: YahooSettings, cache: CsvAdapter) -> Result<Self, ScanError> {
        Ok(Self::new(settings, cache, Box::new(HttpChartClient::new()?)))
    }

    fn cache_age_minutes(&self, symbol: &str) -> Option<i64> {
        let modified = fs::metadata(self.cache.csv_path(symbol))
            .and_then(|m| m.modified())
            .ok()?;
        let modified: DateTime<Utc> = modified.into();
        Some((Utc::now() - modified).num_minutes())
    }

    fn download(&self, symbol: &str) -> Result<BarSeries, ScanError> {
        let mut last_err = data_error(format!("no download attempted for {}", symbol));
        for attempt in 0..self.settings.retries {
            let result = self
                .client
                .get_chart(symbol, &self.settings.interval, &self.settings.range)
                .map_err(data_error)
                .and_then(|body| parse_chart_response(symbol, &body));
            match result {
                Ok(series) if !series.is_empty() => return Ok(series),
                Ok(_) => {
                    last_err = ScanError::NoData {
                        symbol: symbol.to_string(),
                    }
                }
                Err(e) => last_err = e,
            }
            let wait = self.settings.backoff * 2u32.pow(attempt as u32);
            tracing::warn!(
                symbol,
                attempt = attempt + 1,
                retries = self.settings.retries,
                error = %last_err,
                "download failed, retrying in {:?}",
                wait
            );
            std::thread::sleep(wait);
        }
        Err(last_err)
    }

    /// Bars for one symbol, without trying fallbacks.
    fn fetch_symbol(&self, symbol: &str) -> Result<BarSeries, ScanError> {
        if self
            .cache_age_minutes(symbol)
            .is_some_and(|age| age < self.settings.max_cache_age_minutes)
        {
            tracing::debug!(symbol, "using fresh cache");
            return self.cache.fetch_bars(symbol, None, None);
        }

        match self.download(symbol) {
            Ok(series) => {
                if let Err(e) = self.cache.store(&series) {
                    tracing::warn!(symbol, error = %e, "could not write cache");
                }
                tracing::info!(symbol, bars = series.len(), "downloaded");
                Ok(series)
            }
            Err(err) => match self.cache.fetch_bars(symbol, None, None) {
                Ok(stale) if !stale.is_empty() => {
                    tracing::warn!(symbol, error = %err, "using stale cache");
                    Ok(stale)
                }
                _ => Err(err),
            },
        }
    }

    /// Try `symbol`, then each of its fallbacks. The returned series
    /// carries the symbol that actually answered.
    pub fn fetch_with_fallback(&self, symbol: &str) -> Result<BarSeries, ScanError> {
        let mut last_err = None;
        let fallbacks = self
            .settings
            .fallbacks
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let candidates = std::iter::once(symbol).chain(
            fallbacks
                .iter()
                .map(String::as_str)
                .filter(|s| *s != symbol),
        );
        for candidate in candidates {
            match self.fetch_symbol(candidate) {
                Ok(series) => {
                    if candidate != symbol {
                        tracing::warn!(requested = symbol, used = candidate, "using fallback symbol");
                    }
                    return Ok(series);
                }
                Err(e) => {
                    tracing::warn!(symbol = candidate, error = %e, "fetch failed, trying next symbol");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ScanError::NoData {
            symbol: symbol.to_string(),
        }))
    }
}

impl DataPort for YahooAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, ScanError> {
        let series = self.fetch_with_fallback(symbol)?;
        if start.is_none() && end.is_none() {
            return Ok(series);
        }
        let bars: Vec<Bar> = series
            .bars()
            .iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s) && end.is_none_or(|e| b.timestamp <= e))
            .cloned()
            .collect();
        BarSeries::from_bars(series.symbol(), bars)
    }

    /// Symbols present in the cache.
    fn list_symbols(&self) -> Result<Vec<String>, ScanError> {
        self.cache.list_symbols()
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, ScanError> {
        self.cache.get_data_range(symbol)
    }
}

#[cfg(feature = "yahoo")]
pub struct HttpChartClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[cfg(feature = "yahoo")]
impl HttpChartClient {
    pub fn new() -> Result<Self, ScanError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) signalscan")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| data_error(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }
}

#[cfg(feature = "yahoo")]
impl ChartClient for HttpChartClient {
    fn get_chart(&self, symbol: &str, interval: &str, range: &str) -> Result<String, String> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| "base URL cannot take a path".to_string())?
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("interval", interval)
            .append_pair("range", range);

        let response = self.client.get(url).send().map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }
        response.text().map_err(|e| e.to_string())
    }
}
