//! Domain error types.

use chrono::{DateTime, Utc};

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!("{input}\n{caret}\n{err}", err = self)
    }
}

/// Top-level error type for signalscan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("bar at {timestamp} for {symbol} does not follow {previous}")]
    NonMonotonicTimestamp {
        symbol: String,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("alert delivery failed: {reason}")]
    AlertDelivery { reason: String },

    #[error("parameter log error: {reason}")]
    ParamLog { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScanError> for std::process::ExitCode {
    fn from(err: &ScanError) -> Self {
        let code: u8 = match err {
            ScanError::Io(_) => 1,
            ScanError::ConfigParse { .. }
            | ScanError::ConfigMissing { .. }
            | ScanError::ConfigInvalid { .. } => 2,
            ScanError::DataSource { .. } | ScanError::NonMonotonicTimestamp { .. } => 3,
            ScanError::RuleParse(_) | ScanError::RuleInvalid { .. } => 4,
            ScanError::NoData { .. } | ScanError::InsufficientData { .. } => 5,
            ScanError::AlertDelivery { .. } => 6,
            ScanError::ParamLog { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
