//! Append-only JSON Lines parameter log.
//!
//! Each line is one `ParamLogEntry`. Existing lines are never rewritten; a
//! parameter set equal to the most recent entry is not recorded again.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;

use crate::domain::error::ScanError;
use crate::domain::params::{ParamLogEntry, ScanParams};
use crate::ports::param_log_port::ParamLogPort;

pub struct JsonlParamLog {
    path: PathBuf,
}

fn log_error(reason: impl Into<String>) -> ScanError {
    ScanError::ParamLog {
        reason: reason.into(),
    }
}

impl JsonlParamLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ParamLogPort for JsonlParamLog {
    fn append(&self, params: &ScanParams) -> Result<bool, ScanError> {
        let fingerprint = params.fingerprint()?;
        if self
            .latest()?
            .is_some_and(|last| last.fingerprint == fingerprint)
        {
            tracing::debug!(%fingerprint, "parameters unchanged, not logged");
            return Ok(false);
        }

        let entry = ParamLogEntry {
            recorded_at: Utc::now(),
            fingerprint,
            params: params.clone(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| log_error(format!("cannot encode entry: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| log_error(format!("cannot open {}: {}", self.path.display(), e)))?;
        writeln!(file, "{}", line)
            .map_err(|e| log_error(format!("cannot write {}: {}", self.path.display(), e)))?;

        tracing::info!(fingerprint = %entry.fingerprint, path = %self.path.display(), "parameters logged");
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<ParamLogEntry>, ScanError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| log_error(format!("cannot read {}: {}", self.path.display(), e)))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    log_error(format!("{} line {}: {}", self.path.display(), n + 1, e))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::VoterParams;
    use crate::domain::signal::Thresholds;
    use tempfile::TempDir;

    fn params(buy: u32) -> ScanParams {
        ScanParams::new(
            Thresholds { buy, sell: 2 },
            vec![VoterParams {
                name: "rsi".into(),
                weight: 1,
                bullish: Some("BELOW(RSI(14), 30)".into()),
                bearish: Some("ABOVE(RSI(14), 70)".into()),
            }],
        )
    }

    #[test]
    fn missing_file_has_no_entries() {
        let dir = TempDir::new().unwrap();
        let log = JsonlParamLog::new(dir.path().join("params.jsonl"));
        assert!(log.entries().unwrap().is_empty());
        assert!(log.latest().unwrap().is_none());
    }

    #[test]
    fn append_skips_unchanged_params() {
        let dir = TempDir::new().unwrap();
        let log = JsonlParamLog::new(dir.path().join("logs/params.jsonl"));

        assert!(log.append(&params(2)).unwrap());
        assert!(!log.append(&params(2)).unwrap());
        assert!(log.append(&params(3)).unwrap());
        // returning to an earlier set is a change again
        assert!(log.append(&params(2)).unwrap());

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].params.thresholds.buy, 3);
        assert_eq!(entries[2].fingerprint, params(2).fingerprint().unwrap());
        assert_eq!(log.latest().unwrap().unwrap(), entries[2]);
    }

    #[test]
    fn existing_lines_are_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.jsonl");
        let log = JsonlParamLog::new(&path);

        log.append(&params(2)).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        log.append(&params(4)).unwrap();
        let both = fs::read_to_string(&path).unwrap();
        assert!(both.starts_with(&first));
        assert_eq!(both.lines().count(), 2);
    }

    #[test]
    fn corrupt_line_is_param_log_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("params.jsonl");
        fs::write(&path, "{not json}\n").unwrap();
        let err = JsonlParamLog::new(&path).entries().unwrap_err();
        assert!(matches!(err, ScanError::ParamLog { reason } if reason.contains("line 1")));
    }
}
