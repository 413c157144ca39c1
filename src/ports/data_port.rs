//! Market data port trait.

use crate::domain::bar::BarSeries;
use crate::domain::error::ScanError;
use chrono::{DateTime, Utc};

pub trait DataPort {
    /// Bars for `symbol`, oldest first. `None` bounds are open.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BarSeries, ScanError>;

    fn list_symbols(&self) -> Result<Vec<String>, ScanError>;

    /// First and last timestamp plus bar count, or `None` when the symbol
    /// has no data.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, ScanError>;
}
