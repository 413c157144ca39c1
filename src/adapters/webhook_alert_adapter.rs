//! Alert adapter that POSTs JSON to a webhook URL.
//!
//! The payload carries a `text` line (the console rendering) next to the
//! structured alert, which suits chat webhooks and scripts alike. Sending
//! needs the `webhook` feature.

use serde_json::{json, Value};

use crate::domain::error::ScanError;
use crate::domain::monitor::Alert;
use crate::ports::alert_port::AlertPort;

pub fn webhook_payload(alert: &Alert) -> Value {
    json!({
        "text": alert.to_string(),
        "alert": alert,
    })
}

pub struct WebhookAlertAdapter {
    url: String,
    #[cfg(feature = "webhook")]
    client: reqwest::blocking::Client,
}

impl WebhookAlertAdapter {
    #[cfg(feature = "webhook")]
    pub fn new(url: impl Into<String>) -> Result<Self, ScanError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ScanError::AlertDelivery {
                reason: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    #[cfg(not(feature = "webhook"))]
    pub fn new(url: impl Into<String>) -> Result<Self, ScanError> {
        Ok(Self { url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AlertPort for WebhookAlertAdapter {
    #[cfg(feature = "webhook")]
    fn send(&self, alert: &Alert) -> Result<(), ScanError> {
        let response = self
            .client
            .post(&self.url)
            .json(&webhook_payload(alert))
            .send()
            .map_err(|e| ScanError::AlertDelivery {
                reason: format!("POST {}: {}", self.url, e),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::AlertDelivery {
                reason: format!("POST {}: HTTP {}", self.url, status),
            });
        }
        Ok(())
    }

    #[cfg(not(feature = "webhook"))]
    fn send(&self, _alert: &Alert) -> Result<(), ScanError> {
        Err(ScanError::AlertDelivery {
            reason: format!(
                "cannot POST to {}: built without the webhook feature",
                self.url
            ),
        })
    }
}
