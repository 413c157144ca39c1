//! Port traits between the domain and the outside world.

pub mod alert_port;
pub mod config_port;
pub mod data_port;
pub mod param_log_port;
pub mod report_port;
