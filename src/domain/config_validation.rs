//! Configuration validation.
//!
//! Validates every config field before any data is loaded.

use crate::domain::calendar::years_before;
use crate::domain::error::RebalancerError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Strategy families accepted by `[strategies] enabled`.
pub const STRATEGY_KEYS: [&str; 6] = ["buy_and_hold", "static", "drawdown", "zone", "macro", "macro_zone"];

pub const DATA_SOURCES: [&str; 2] = ["csv", "sqlite"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    validate_initial_capital(config)?;
    validate_monthly_contribution(config)?;
    validate_rebalance_day(config)?;
    validate_warmup(config)?;
    backtest_dates(config)?;
    Ok(())
}

pub fn validate_strategies_config(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    enabled_strategies(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    let source = data_source(config)?;
    if source == "csv" {
        match config.get_string("data", "dir") {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(RebalancerError::ConfigMissing {
                    section: "data".to_string(),
                    key: "dir".to_string(),
                })
            }
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    let value = config.get_double("backtest", "initial_capital", 100.0);
    if value <= 0.0 {
        return Err(RebalancerError::config_invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_monthly_contribution(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    let value = config.get_double("backtest", "monthly_contribution", 0.0);
    if value < 0.0 {
        return Err(RebalancerError::config_invalid(
            "backtest",
            "monthly_contribution",
            "monthly_contribution must be non-negative",
        ));
    }
    Ok(())
}

fn validate_rebalance_day(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    let value = config.get_int("backtest", "rebalance_day", 15);
    if !(1..=28).contains(&value) {
        return Err(RebalancerError::config_invalid(
            "backtest",
            "rebalance_day",
            "rebalance_day must be between 1 and 28",
        ));
    }
    Ok(())
}

fn validate_warmup(config: &dyn ConfigPort) -> Result<(), RebalancerError> {
    if config.get_int("backtest", "warmup_days", 365) < 0 {
        return Err(RebalancerError::config_invalid(
            "backtest",
            "warmup_days",
            "warmup_days must be non-negative",
        ));
    }
    Ok(())
}

/// The backtest horizon. `start_date` wins over `years`; `years` counts back
/// from `end_date`.
pub fn backtest_dates(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), RebalancerError> {
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    let start_date = match config.get_string("backtest", "start_date") {
        Some(s) => parse_date(Some(&s), "start_date")?,
        None => {
            let years = config.get_int("backtest", "years", 0);
            if years <= 0 {
                return Err(RebalancerError::ConfigMissing {
                    section: "backtest".to_string(),
                    key: "start_date".to_string(),
                });
            }
            u32::try_from(years)
                .ok()
                .and_then(|y| years_before(end_date, y))
                .ok_or_else(|| RebalancerError::config_invalid("backtest", "years", "years out of range"))?
        }
    };

    if start_date >= end_date {
        return Err(RebalancerError::config_invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok((start_date, end_date))
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, RebalancerError> {
    match value {
        None => Err(RebalancerError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            RebalancerError::config_invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

/// Enabled strategy families, all of them when the key is absent.
pub fn enabled_strategies(config: &dyn ConfigPort) -> Result<Vec<String>, RebalancerError> {
    let Some(raw) = config.get_string("strategies", "enabled") else {
        return Ok(STRATEGY_KEYS.iter().map(|s| s.to_string()).collect());
    };
    let mut enabled = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !STRATEGY_KEYS.contains(&name) {
            return Err(RebalancerError::config_invalid(
                "strategies",
                "enabled",
                format!("unknown strategy '{}'", name),
            ));
        }
        if !enabled.iter().any(|e| e == name) {
            enabled.push(name.to_string());
        }
    }
    Ok(enabled)
}

pub fn data_source(config: &dyn ConfigPort) -> Result<String, RebalancerError> {
    let source = config
        .get_string("data", "source")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "csv".to_string());
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(RebalancerError::config_invalid(
            "data",
            "source",
            format!("unknown data source '{}'", source),
        ));
    }
    Ok(source)
}
