//! CSV file data adapter.
//!
//! One file per symbol, `{SYMBOL}.csv`, with the header
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` (UTC) or bare `YYYY-MM-DD` dates (midnight UTC).

use crate::domain::bar::{Bar, BarSeries};
use crate::domain::error::ScanError;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// File-name-safe form of a symbol: `GC=F` becomes `GC_F`.
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn data_error(reason: impl Into<String>) -> ScanError {
    ScanError::DataSource {
        reason: reason.into(),
    }
}

fn column(record: &csv::StringRecord, index: usize, line: u64) -> Result<f64, ScanError> {
    let name = HEADER[index];
    let text = record
        .get(index)
        .ok_or_else(|| data_error(format!("line {}: missing {} column", line, name)))?
        .trim();
    if index == 5 && text.is_empty() {
        return Ok(0.0);
    }
    text.parse()
        .map_err(|e| data_error(format!("line {}: invalid {} value '{}': {}", line, name, text, e)))
}

/// Parse CSV text into bars sorted by timestamp, keeping `[start, end]`.
pub fn parse_bars(
    content: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<Bar>, ScanError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let ts_text = record
            .get(0)
            .ok_or_else(|| data_error(format!("line {}: missing timestamp column", line)))?;
        let timestamp = parse_timestamp(ts_text)
            .ok_or_else(|| data_error(format!("line {}: invalid timestamp '{}'", line, ts_text)))?;

        if start.is_some_and(|s| timestamp < s) || end.is_some_and(|e| timestamp > e) {
            continue;
        }

        bars.push(Bar {
            timestamp,
            open: column(&record, 1, line)?,
            high: column(&record, 2, line)?,
            low: column(&record, 3, line)?,
            close: column(&record, 4, line)?,
            volume: column(&record, 5, line)?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Write a series in the adapter's file layout.
pub fn write_series(path: &Path, series: &BarSeries) -> Result<(), ScanError> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| data_error(format!("cannot write {}: {}", path.display(), e)))?;
    let write_err = |e: csv::Error| data_error(format!("cannot write {}: {}", path.display(), e));
    wtr.write_record(HEADER).map_err(write_err)?;
    for bar in series.bars() {
        wtr.write_record([
            bar.timestamp.to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])
        .map_err(write_err)?;
    }
    wtr.flush()?;
    Ok(())
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", sanitize_symbol(symbol)))
    }

    pub fn store(&self, series: &BarSeries) -> Result<(), ScanError> {
        fs::create_dir_all(&self.base_path)?;
        write_series(&self.csv_path(series.symbol()), series)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, ScanError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;
        BarSeries::from_bars(symbol, parse_bars(&content, start, end)?)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ScanError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, ScanError> {
        if !self.csv_path(symbol).exists() {
            return Ok(None);
        }
        let series = self.fetch_bars(symbol, None, None)?;
        Ok(match (series.bars().first(), series.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, series.len())),
            _ => None,
        })
    }
}
