//! Weighted multi-stock allocation ("invest").
//!
//! Splits a capital amount across weighted tickers into independent
//! purchases. A ticker whose share is too small to buy one share, or that
//! has no price for the day, is recorded and skipped; the rest still buy.
//! Problems with the call as a whole (bad weights, bad timestamp) reject it
//! before anything is purchased.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use tracing::warn;

use super::error::StocksimError;
use super::execution::{self, check_trading_window, validate_amount, validate_commission};
use super::holding::Holding;
use super::portfolio::Portfolio;
use super::weights::Weights;
use crate::ports::price_port::PricePort;

/// What happened to one ticker of an allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationOutcome {
    Bought(Holding),
    Skipped { ticker: String, reason: String },
}

impl AllocationOutcome {
    pub fn ticker(&self) -> &str {
        match self {
            AllocationOutcome::Bought(h) => h.ticker(),
            AllocationOutcome::Skipped { ticker, .. } => ticker,
        }
    }

    pub fn is_bought(&self) -> bool {
        matches!(self, AllocationOutcome::Bought(_))
    }
}

impl fmt::Display for AllocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationOutcome::Bought(h) => write!(
                f,
                "bought {} shares of {} at {:.2} on {}",
                h.shares(),
                h.ticker(),
                h.unit_price(),
                h.purchase_date().format(execution::DATE_FORMAT)
            ),
            AllocationOutcome::Skipped { ticker, reason } => {
                write!(f, "could not buy {ticker}: {reason}")
            }
        }
    }
}

/// One line per attempted ticker, in the order processed.
pub fn summarize(outcomes: &[AllocationOutcome]) -> String {
    outcomes
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check an allocation request as a whole. Nothing may be bought if this fails.
pub fn validate_allocation(
    weights: &Weights,
    total_amount: f64,
    commission: f64,
) -> Result<(), StocksimError> {
    validate_amount(total_amount)?;
    validate_commission(commission)?;
    weights.validate()
}

/// Invest `total_amount` across `weights` at `at`, appending every bought
/// lot to `portfolio` as soon as it is bought. Zero-weight tickers are not
/// attempted. A price source failure aborts the call; lots bought before it
/// stay in the portfolio.
pub fn invest(
    portfolio: &mut Portfolio,
    prices: &dyn PricePort,
    today: NaiveDate,
    weights: &Weights,
    total_amount: f64,
    commission: f64,
    at: NaiveDateTime,
) -> Result<Vec<AllocationOutcome>, StocksimError> {
    let name = portfolio.name().to_string();
    let order = Order {
        weights,
        total_amount,
        commission,
        at,
    };
    allocate_with(&name, prices, today, &order, |holding| {
        portfolio.add_holding(holding.clone());
    })
}

/// Work out the same purchases as [`invest`] without touching any portfolio.
/// The caller commits the `Bought` lots once the whole call has succeeded.
pub fn allocate(
    portfolio: &str,
    prices: &dyn PricePort,
    today: NaiveDate,
    weights: &Weights,
    total_amount: f64,
    commission: f64,
    at: NaiveDateTime,
) -> Result<Vec<AllocationOutcome>, StocksimError> {
    let order = Order {
        weights,
        total_amount,
        commission,
        at,
    };
    allocate_with(portfolio, prices, today, &order, |_| {})
}

/// Append the `Bought` lots of `outcomes` to `portfolio`.
pub fn commit(portfolio: &mut Portfolio, outcomes: &[AllocationOutcome]) {
    for outcome in outcomes {
        if let AllocationOutcome::Bought(holding) = outcome {
            portfolio.add_holding(holding.clone());
        }
    }
}

struct Order<'a> {
    weights: &'a Weights,
    total_amount: f64,
    commission: f64,
    at: NaiveDateTime,
}

fn allocate_with<F>(
    portfolio: &str,
    prices: &dyn PricePort,
    today: NaiveDate,
    order: &Order<'_>,
    mut on_bought: F,
) -> Result<Vec<AllocationOutcome>, StocksimError>
where
    F: FnMut(&Holding),
{
    validate_allocation(order.weights, order.total_amount, order.commission)?;
    check_trading_window(order.at)?;

    let mut outcomes = Vec::with_capacity(order.weights.len());
    for (ticker, percent) in order.weights.iter() {
        if percent <= 0.0 {
            continue;
        }
        let capital = order.total_amount * percent / 100.0;
        let purchase = execution::execute_purchase(
            prices,
            today,
            ticker,
            capital,
            order.commission,
            order.at,
        );
        match purchase {
            Ok(holding) => {
                on_bought(&holding);
                outcomes.push(AllocationOutcome::Bought(holding));
            }
            Err(e) if e.is_recoverable_in_allocation() => {
                warn!(portfolio, ticker, error = %e, "allocation skipped ticker");
                outcomes.push(AllocationOutcome::Skipped {
                    ticker: ticker.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(outcomes)
}
