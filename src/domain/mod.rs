//! Core domain types and logic.

pub mod allocation;
pub mod asset;
pub mod backtest;
pub mod calendar;
pub mod config_validation;
pub mod cut_loss;
pub mod error;
pub mod interest;
pub mod market;
pub mod metrics;
pub mod policy;
pub mod portfolio;
pub mod rebalance;
pub mod series;
pub mod universe;
