//! Alert adapter that prints to stdout.

use std::io::Write;

use crate::domain::error::ScanError;
use crate::domain::monitor::Alert;
use crate::ports::alert_port::AlertPort;

#[derive(Debug, Default)]
pub struct ConsoleAlertAdapter {
    /// Ring the terminal bell with every alert.
    pub beep: bool,
}

impl ConsoleAlertAdapter {
    pub fn new(beep: bool) -> Self {
        Self { beep }
    }

    pub fn render(&self, alert: &Alert) -> String {
        if self.beep {
            format!("{}\x07", alert)
        } else {
            alert.to_string()
        }
    }
}

impl AlertPort for ConsoleAlertAdapter {
    fn send(&self, alert: &Alert) -> Result<(), ScanError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", self.render(alert)).map_err(|e| ScanError::AlertDelivery {
            reason: format!("stdout: {}", e),
        })?;
        stdout.flush().map_err(|e| ScanError::AlertDelivery {
            reason: format!("stdout: {}", e),
        })
    }
}
