//! Recurring weighted allocations (dollar-cost averaging).
//!
//! A named strategy lives in the model's registry as a template and never
//! carries a resume cursor. Applying it, or calling dollar-cost-average
//! directly, attaches a live copy to a portfolio; that copy's
//! `next_due_date` is advanced as executions happen and is persisted so a
//! later run can replay the intervals it missed.

use chrono::NaiveDate;

use crate::domain::error::StocksimError;
use crate::domain::weights::Weights;

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    /// `None` for the anonymous strategies created by dollar-cost-average.
    pub name: Option<String>,
    pub start_date: NaiveDate,
    /// `None` means open-ended: execution stops at "today" and resumes later.
    pub end_date: Option<NaiveDate>,
    pub interval_days: u32,
    pub amount: f64,
    pub commission: f64,
    pub weights: Weights,
    pub next_due_date: Option<NaiveDate>,
}

impl Strategy {
    pub fn validate(&self) -> Result<(), StocksimError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(StocksimError::validation(
                    "strategy name",
                    "name must not be empty",
                ));
            }
        }
        if self.interval_days < 1 {
            return Err(StocksimError::validation(
                "interval",
                "interval must be at least one day",
            ));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(StocksimError::validation("amount", "amount must be non-negative"));
        }
        if !self.commission.is_finite() || self.commission < 0.0 {
            return Err(StocksimError::validation(
                "commission",
                "commission must be non-negative",
            ));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(StocksimError::validation(
                    "end date",
                    "end date must not be before start date",
                ));
            }
        }
        self.weights.validate()
    }

    /// Where the next execution attempt starts: the persisted cursor, or the
    /// start date if the strategy has never run.
    pub fn cursor(&self) -> NaiveDate {
        self.next_due_date.unwrap_or(self.start_date)
    }

    /// The last date this strategy may execute on, given today's date.
    pub fn effective_end(&self, today: NaiveDate) -> NaiveDate {
        match self.end_date {
            Some(end) => end.min(today),
            None => today,
        }
    }

    /// True once the cursor has moved past the declared end date. Open-ended
    /// strategies are never exhausted.
    pub fn is_exhausted(&self) -> bool {
        match self.end_date {
            Some(end) => self.cursor() > end,
            None => false,
        }
    }

    /// A fresh live copy for attaching to a portfolio.
    pub fn instantiate(&self) -> Strategy {
        Strategy {
            next_due_date: None,
            ..self.clone()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(anonymous)")
    }
}
