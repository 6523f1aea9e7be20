//! Configuration validation.
//!
//! Validates every config field before any adapter is opened.

use crate::domain::error::StocksimError;
use crate::domain::model::{DEFAULT_LOOKBACK_DAYS, ModelSettings};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_POOL_SIZE: i64 = 4;
const MAX_LOOKBACK_DAYS: i64 = 366;
const MAX_POOL_SIZE: i64 = 64;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    validate_prices_directory(config)?;
    validate_lookback_days(config)?;
    validate_store_path(config)?;
    validate_pool_size(config)?;
    validate_default_commission(config)?;
    Ok(())
}

/// Model settings from a config that has passed [`validate_config`].
pub fn model_settings(config: &dyn ConfigPort) -> ModelSettings {
    let lookback = config.get_int("prices", "lookback_days", i64::from(DEFAULT_LOOKBACK_DAYS));
    ModelSettings {
        lookback_days: u32::try_from(lookback).unwrap_or(DEFAULT_LOOKBACK_DAYS),
        strict_strategy_portfolios: config.get_bool("trading", "strict_strategy_portfolios", true),
    }
}

pub fn default_commission(config: &dyn ConfigPort) -> f64 {
    config.get_double("trading", "commission", 0.0)
}

fn validate_prices_directory(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    if config.get_string("prices", "directory").is_none() {
        return Err(StocksimError::ConfigMissing {
            section: "prices".to_string(),
            key: "directory".to_string(),
        });
    }
    Ok(())
}

fn validate_lookback_days(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = config.get_int("prices", "lookback_days", i64::from(DEFAULT_LOOKBACK_DAYS));
    if !(0..=MAX_LOOKBACK_DAYS).contains(&value) {
        return Err(StocksimError::ConfigInvalid {
            section: "prices".to_string(),
            key: "lookback_days".to_string(),
            reason: format!("lookback_days must be between 0 and {MAX_LOOKBACK_DAYS}"),
        });
    }
    Ok(())
}

fn validate_store_path(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    if config.get_string("store", "path").is_none() {
        return Err(StocksimError::ConfigMissing {
            section: "store".to_string(),
            key: "path".to_string(),
        });
    }
    Ok(())
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = config.get_int("store", "pool_size", DEFAULT_POOL_SIZE);
    if !(1..=MAX_POOL_SIZE).contains(&value) {
        return Err(StocksimError::ConfigInvalid {
            section: "store".to_string(),
            key: "pool_size".to_string(),
            reason: format!("pool_size must be between 1 and {MAX_POOL_SIZE}"),
        });
    }
    Ok(())
}

fn validate_default_commission(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = default_commission(config);
    if !value.is_finite() || value < 0.0 {
        return Err(StocksimError::ConfigInvalid {
            section: "trading".to_string(),
            key: "commission".to_string(),
            reason: "commission must be non-negative".to_string(),
        });
    }
    Ok(())
}
