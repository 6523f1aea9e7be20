//! Periodic strategy execution with catch-up.
//!
//! A live strategy is either pending (its cursor is on or before the
//! effective end date) or exhausted. Each pass of the loop either rolls a
//! non-trading cursor forward by a day, or invests at 15:59 on the cursor
//! and moves it `interval_days` past that date. The cursor is written back
//! after every step, so a strategy reloaded from storage picks up exactly
//! where the previous run stopped. Re-running with the same cursor and the
//! same effective end date buys nothing.
//!
//! A step applies in full or not at all: its lots reach the portfolio only
//! after every ticker of the step has been attempted.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use super::allocation::{self, AllocationOutcome};
use super::calendar;
use super::error::StocksimError;
use super::portfolio::Portfolio;
use super::strategy::Strategy;
use crate::ports::price_port::PricePort;

/// Executions run one minute before close so the hours check always passes.
pub const EXECUTION_HOUR: u32 = 15;
pub const EXECUTION_MINUTE: u32 = 59;

/// One interval boundary that was executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub date: NaiveDate,
    pub outcomes: Vec<AllocationOutcome>,
}

/// Result of running one strategy up to its effective end date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScheduleReport {
    pub portfolio: String,
    pub strategy: Option<String>,
    pub executions: Vec<Execution>,
    /// Due dates that fell on non-trading days and were rolled forward.
    pub skipped_dates: Vec<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
}

impl ScheduleReport {
    pub fn purchase_count(&self) -> usize {
        self.executions
            .iter()
            .flat_map(|e| e.outcomes.iter())
            .filter(|o| o.is_bought())
            .count()
    }

    pub fn is_noop(&self) -> bool {
        self.executions.is_empty()
    }
}

pub fn execution_time(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(EXECUTION_HOUR, EXECUTION_MINUTE, 0)
}

/// Run `strategy` against `portfolio` from its cursor up to
/// `min(end_date, today)`.
///
/// On error the cursor stays on the step that failed and that step buys
/// nothing, so running again retries it. Steps completed earlier in this run
/// keep their purchases.
pub fn run_strategy(
    strategy: &mut Strategy,
    portfolio: &mut Portfolio,
    prices: &dyn PricePort,
    today: NaiveDate,
) -> Result<ScheduleReport, StocksimError> {
    strategy.validate()?;

    let end = strategy.effective_end(today);
    let mut cursor = strategy.cursor();
    let mut report = ScheduleReport {
        portfolio: portfolio.name().to_string(),
        strategy: strategy.name.clone(),
        ..ScheduleReport::default()
    };

    while cursor <= end {
        if calendar::is_non_trading_day(cursor) {
            debug!(date = %cursor, "due date is not a trading day, rolling forward");
            report.skipped_dates.push(cursor);
            cursor = next_day(cursor)?;
            strategy.next_due_date = Some(cursor);
            continue;
        }

        let at = execution_time(cursor).ok_or_else(|| {
            StocksimError::validation("due date", format!("cannot schedule on {cursor}"))
        })?;
        let outcomes = allocation::allocate(
            portfolio.name(),
            prices,
            today,
            &strategy.weights,
            strategy.amount,
            strategy.commission,
            at,
        )?;
        allocation::commit(portfolio, &outcomes);
        report.executions.push(Execution {
            date: cursor,
            outcomes,
        });

        cursor = cursor
            .checked_add_signed(Duration::days(i64::from(strategy.interval_days)))
            .ok_or_else(|| {
                StocksimError::validation("interval", "next due date is out of range")
            })?;
        strategy.next_due_date = Some(cursor);
    }

    strategy.next_due_date = Some(cursor);
    report.next_due_date = Some(cursor);

    if !report.is_noop() {
        info!(
            strategy = strategy.display_name(),
            portfolio = portfolio.name(),
            executions = report.executions.len(),
            purchases = report.purchase_count(),
            next_due = %cursor,
            "strategy caught up"
        );
    }
    Ok(report)
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, StocksimError> {
    date.succ_opt()
        .ok_or_else(|| StocksimError::validation("due date", "next due date is out of range"))
}
