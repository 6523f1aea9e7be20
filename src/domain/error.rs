//! Domain error types.

use chrono::{NaiveDate, NaiveTime};

/// Top-level error type for stocksim.
#[derive(Debug, thiserror::Error)]
pub enum StocksimError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{date} is not a trading day")]
    NonTradingDay { date: NaiveDate },

    #[error("{time} is outside trading hours (09:00 to 16:00)")]
    OutsideTradingHours { time: NaiveTime },

    #[error("insufficient funds: {amount:.2} cannot buy one share of {ticker} at {price:.2}")]
    InsufficientFunds {
        ticker: String,
        amount: f64,
        price: f64,
    },

    #[error("no price data for {ticker} on {date}")]
    UnknownPrice { ticker: String, date: NaiveDate },

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name} already exists")]
    Conflict { kind: &'static str, name: String },

    #[error("portfolio {portfolio} is managed by a strategy and cannot accept direct buys")]
    StrategyManaged { portfolio: String },

    #[error("price source error: {reason}")]
    PriceSource { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StocksimError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        StocksimError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Failures the allocator records against a single ticker while the
    /// remaining tickers of the same call go ahead.
    pub fn is_recoverable_in_allocation(&self) -> bool {
        matches!(
            self,
            StocksimError::InsufficientFunds { .. } | StocksimError::UnknownPrice { .. }
        )
    }
}

impl From<&StocksimError> for std::process::ExitCode {
    fn from(err: &StocksimError) -> Self {
        let code: u8 = match err {
            StocksimError::Io(_) => 1,
            StocksimError::ConfigParse { .. }
            | StocksimError::ConfigMissing { .. }
            | StocksimError::ConfigInvalid { .. } => 2,
            StocksimError::PriceSource { .. }
            | StocksimError::Database { .. }
            | StocksimError::DatabaseQuery { .. } => 3,
            StocksimError::Validation { .. }
            | StocksimError::NonTradingDay { .. }
            | StocksimError::OutsideTradingHours { .. } => 4,
            StocksimError::InsufficientFunds { .. } | StocksimError::UnknownPrice { .. } => 5,
            StocksimError::NotFound { .. }
            | StocksimError::Conflict { .. }
            | StocksimError::StrategyManaged { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
