//! Append-only parameter change log port.

use crate::domain::error::ScanError;
use crate::domain::params::{ParamLogEntry, ScanParams};

pub trait ParamLogPort {
    /// Record `params` unless the most recent entry has the same
    /// fingerprint. Returns whether a line was appended.
    fn append(&self, params: &ScanParams) -> Result<bool, ScanError>;

    /// Every entry, oldest first.
    fn entries(&self) -> Result<Vec<ParamLogEntry>, ScanError>;

    fn latest(&self) -> Result<Option<ParamLogEntry>, ScanError> {
        Ok(self.entries()?.pop())
    }
}
