//! In-memory price table.

use crate::domain::error::StocksimError;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StaticPriceTable {
    prices: HashMap<(String, NaiveDate), f64>,
}

impl StaticPriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, ticker: &str, date: NaiveDate, price: f64) -> Self {
        self.insert(ticker, date, price);
        self
    }

    /// The same closing price on every calendar day in `[from, to]`.
    pub fn with_daily_price(
        mut self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        price: f64,
    ) -> Self {
        for date in from.iter_days().take_while(|d| *d <= to) {
            self.insert(ticker, date, price);
        }
        self
    }

    pub fn insert(&mut self, ticker: &str, date: NaiveDate, price: f64) {
        self.prices.insert((ticker.to_uppercase(), date), price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PricePort for StaticPriceTable {
    fn closing_price(&self, ticker: &str, date: NaiveDate) -> Result<Option<f64>, StocksimError> {
        Ok(self.prices.get(&(ticker.to_uppercase(), date)).copied())
    }
}
