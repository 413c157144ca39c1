#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use signalscan::adapters::csv_adapter::CsvAdapter;
use signalscan::domain::bar::{Bar, BarSeries};
use signalscan::domain::error::ScanError;
use signalscan::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub struct MockDataPort {
    pub series: HashMap<String, BarSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: BarSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, ScanError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ScanError::DataSource {
                reason: reason.clone(),
            });
        }
        let Some(series) = self.series.get(symbol) else {
            return Ok(BarSeries::new(symbol));
        };
        let bars = series
            .bars()
            .iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s) && end.is_none_or(|e| b.timestamp <= e))
            .cloned()
            .collect();
        BarSeries::from_bars(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScanError> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, ScanError> {
        Ok(self.series.get(symbol).and_then(|s| {
            let first = s.bars().first()?;
            let last = s.last()?;
            Some((first.timestamp, last.timestamp, s.len()))
        }))
    }
}

/// Tuesday 2024-01-02 00:00 UTC.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

/// Hourly bars from [`start`]; each bar opens at the previous close.
pub fn hourly_series(symbol: &str, closes: &[f64]) -> BarSeries {
    let mut prev = closes.first().copied().unwrap_or(0.0);
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Bar {
                timestamp: start() + Duration::hours(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1000.0,
            }
        })
        .collect();
    BarSeries::from_bars(symbol, bars).unwrap()
}

pub fn rising(count: usize, from: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| from + step * i as f64).collect()
}

/// Up `leg` bars, down `leg` bars, repeated.
pub fn zigzag(count: usize, leg: usize, from: f64, step: f64) -> Vec<f64> {
    let mut price = from;
    (0..count)
        .map(|i| {
            if (i / leg) % 2 == 0 {
                price += step;
            } else {
                price -= step;
            }
            price
        })
        .collect()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_csv(dir: &Path, series: &BarSeries) {
    CsvAdapter::new(dir.to_path_buf()).store(series).unwrap();
}
