//! Core domain types and logic.

pub mod bar;
pub mod config_validation;
pub mod error;
pub mod gate;
pub mod indicator;
pub mod indicator_helpers;
pub mod monitor;
pub mod params;
pub mod replay;
pub mod rule;
pub mod rule_eval;
pub mod rule_parser;
pub mod signal;
pub mod trade_sim;
pub mod vote;
