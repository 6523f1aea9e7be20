//! One purchased lot.

use chrono::NaiveDate;

/// An executed purchase of whole shares of one ticker on one date.
///
/// Holdings are immutable once created; only the purchase executor (and the
/// store when rehydrating) constructs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    ticker: String,
    shares: u64,
    unit_price: f64,
    purchase_date: NaiveDate,
    commission: f64,
}

impl Holding {
    pub(crate) fn new(
        ticker: impl Into<String>,
        shares: u64,
        unit_price: f64,
        purchase_date: NaiveDate,
        commission: f64,
    ) -> Self {
        Holding {
            ticker: ticker.into(),
            shares,
            unit_price,
            purchase_date,
            commission,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn purchase_date(&self) -> NaiveDate {
        self.purchase_date
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    /// shares * unit_price + commission
    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.unit_price + self.commission
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn is_held_on(&self, date: NaiveDate) -> bool {
        self.purchase_date <= date
    }
}
