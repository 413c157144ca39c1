//! CSV report adapter implementing ReportPort.
//!
//! One row per evaluated bar. List columns (gate reasons, voter names) are
//! joined with `;`.

use std::fs;
use std::path::Path;

use crate::domain::error::ScanError;
use crate::domain::signal::SignalEvaluation;
use crate::ports::report_port::ReportPort;

pub const REPORT_HEADER: [&str; 14] = [
    "symbol",
    "timestamp",
    "close",
    "buy_score",
    "sell_score",
    "buy_threshold",
    "sell_threshold",
    "conviction",
    "raw",
    "signal",
    "blocked",
    "reasons",
    "bullish",
    "bearish",
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn report_error(path: &str, e: impl std::fmt::Display) -> ScanError {
    ScanError::Io(std::io::Error::other(format!(
        "cannot write report {}: {}",
        path, e
    )))
}

impl ReportPort for CsvReportAdapter {
    fn write_evaluations(
        &self,
        symbol: &str,
        evaluations: &[SignalEvaluation],
        output_path: &str,
    ) -> Result<(), ScanError> {
        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| report_error(output_path, e))?;
        wtr.write_record(REPORT_HEADER)
            .map_err(|e| report_error(output_path, e))?;
        for eval in evaluations {
            wtr.write_record([
                symbol.to_string(),
                eval.timestamp.to_rfc3339(),
                eval.close.to_string(),
                eval.buy_score.to_string(),
                eval.sell_score.to_string(),
                eval.threshold.buy.to_string(),
                eval.threshold.sell.to_string(),
                format!("{:.4}", eval.conviction),
                eval.raw.to_string(),
                eval.signal.to_string(),
                eval.blocked.to_string(),
                eval.reasons.join(";"),
                eval.bullish.join(";"),
                eval.bearish.join(";"),
            ])
            .map_err(|e| report_error(output_path, e))?;
        }
        wtr.flush()?;
        tracing::info!(symbol, rows = evaluations.len(), path = output_path, "report written");
        Ok(())
    }
}
