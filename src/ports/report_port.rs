//! Report generation port trait.

use crate::domain::error::ScanError;
use crate::domain::signal::SignalEvaluation;

/// Port for writing evaluation reports.
pub trait ReportPort {
    fn write_evaluations(
        &self,
        symbol: &str,
        evaluations: &[SignalEvaluation],
        output_path: &str,
    ) -> Result<(), ScanError>;
}
