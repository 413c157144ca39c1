//! Alert delivery port trait.

use crate::domain::error::ScanError;
use crate::domain::monitor::Alert;

pub trait AlertPort {
    fn send(&self, alert: &Alert) -> Result<(), ScanError>;
}
