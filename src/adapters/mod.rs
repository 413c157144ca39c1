//! Concrete adapter implementations for ports.

pub mod console_alert_adapter;
pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod jsonl_param_log;
pub mod webhook_alert_adapter;
pub mod yahoo_adapter;
