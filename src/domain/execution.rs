//! Share purchase execution.
//!
//! Turns "spend this much on that ticker at this timestamp" into a
//! [`Holding`] of whole shares, or a typed rejection. Capital that does not
//! buy a whole share is discarded.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use super::calendar;
use super::error::StocksimError;
use super::holding::Holding;
use super::weights::canonical_ticker;
use crate::ports::price_port::PricePort;

/// Day-month-year hour:minute, e.g. `07-05-2018 15:59`.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Day-month-year, e.g. `07-05-2018`.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, StocksimError> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|_| {
        StocksimError::validation(
            "timestamp",
            format!("{value:?} is not in dd-mm-yyyy HH:MM format"),
        )
    })
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, StocksimError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        StocksimError::validation(field, format!("{value:?} is not in dd-mm-yyyy format"))
    })
}

pub fn validate_commission(commission: f64) -> Result<(), StocksimError> {
    if !commission.is_finite() || commission < 0.0 {
        return Err(StocksimError::validation(
            "commission",
            "commission must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_amount(amount: f64) -> Result<(), StocksimError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(StocksimError::validation("amount", "amount must be non-negative"));
    }
    Ok(())
}

/// Reject timestamps on non-trading days or outside [09:00, 16:00).
pub fn check_trading_window(at: NaiveDateTime) -> Result<(), StocksimError> {
    let date = at.date();
    if calendar::is_non_trading_day(date) {
        return Err(StocksimError::NonTradingDay { date });
    }
    if !calendar::is_within_trading_hours(at.time()) {
        return Err(StocksimError::OutsideTradingHours { time: at.time() });
    }
    Ok(())
}

/// Number of whole shares `amount` buys at `price`.
pub fn whole_shares(amount: f64, price: f64) -> u64 {
    (amount / price).floor() as u64
}

/// Execute a purchase from a textual timestamp.
///
/// Checks, in order, each with its own rejection:
/// 1. ticker and timestamp are non-empty
/// 2. commission is non-negative
/// 3. timestamp parses as dd-mm-yyyy HH:MM
/// 4. everything [`execute_purchase`] checks
pub fn execute_purchase_at(
    prices: &dyn PricePort,
    today: NaiveDate,
    ticker: &str,
    amount: f64,
    commission: f64,
    timestamp: &str,
) -> Result<Holding, StocksimError> {
    canonical_ticker(ticker)?;
    if timestamp.trim().is_empty() {
        return Err(StocksimError::validation(
            "timestamp",
            "timestamp must not be empty",
        ));
    }
    validate_commission(commission)?;
    let at = parse_timestamp(timestamp)?;
    execute_purchase(prices, today, ticker, amount, commission, at)
}

/// Execute a purchase.
///
/// Steps:
/// 1. Canonicalise the ticker, check commission
/// 2. Reject non-trading days, then times outside trading hours
/// 3. Check amount is non-negative
/// 4. Look up the closing price; a date after `today` is never looked up
///    and counts as unknown, as does a non-positive price
/// 5. shares = floor(amount / price); zero shares is insufficient funds
pub fn execute_purchase(
    prices: &dyn PricePort,
    today: NaiveDate,
    ticker: &str,
    amount: f64,
    commission: f64,
    at: NaiveDateTime,
) -> Result<Holding, StocksimError> {
    let ticker = canonical_ticker(ticker)?;
    validate_commission(commission)?;
    check_trading_window(at)?;
    validate_amount(amount)?;

    let date = at.date();
    let price = if date > today {
        None
    } else {
        prices
            .closing_price(&ticker, date)?
            .filter(|p| p.is_finite() && *p > 0.0)
    };
    let price = price.ok_or_else(|| StocksimError::UnknownPrice {
        ticker: ticker.clone(),
        date,
    })?;

    let shares = whole_shares(amount, price);
    if shares < 1 {
        return Err(StocksimError::InsufficientFunds {
            ticker,
            amount,
            price,
        });
    }

    debug!(%ticker, shares, price, %date, "executed purchase");
    Ok(Holding::new(ticker, shares, price, date, commission))
}
