#![allow(dead_code)]

use chrono::NaiveDate;
use stocksim::adapters::clock_adapter::FixedClock;
use stocksim::adapters::static_price_adapter::StaticPriceTable;
use stocksim::domain::error::StocksimError;
use stocksim::domain::model::PortfolioModel;
use stocksim::domain::strategy::Strategy;
use stocksim::domain::weights::Weights;
use stocksim::ports::price_port::PricePort;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Price port with per-ticker failures and a shared lookup counter.
pub struct MockPricePort {
    pub table: StaticPriceTable,
    pub errors: HashMap<String, String>,
    pub lookups: Rc<Cell<usize>>,
}

impl MockPricePort {
    pub fn new(table: StaticPriceTable) -> Self {
        Self {
            table,
            errors: HashMap::new(),
            lookups: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn closing_price(&self, ticker: &str, date: NaiveDate) -> Result<Option<f64>, StocksimError> {
        self.lookups.set(self.lookups.get() + 1);
        if let Some(reason) = self.errors.get(ticker) {
            return Err(StocksimError::PriceSource {
                reason: reason.clone(),
            });
        }
        self.table.closing_price(ticker, date)
    }
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Flat daily closes for 2018: FB 185, AAPL 165, NFLX 326, GOOG 1054.
pub fn faang_prices() -> StaticPriceTable {
    StaticPriceTable::new()
        .with_daily_price("FB", d(2018, 1, 1), d(2018, 12, 31), 185.0)
        .with_daily_price("AAPL", d(2018, 1, 1), d(2018, 12, 31), 165.0)
        .with_daily_price("NFLX", d(2018, 1, 1), d(2018, 12, 31), 326.0)
        .with_daily_price("GOOG", d(2018, 1, 1), d(2018, 12, 31), 1054.0)
}

pub fn faang_weights() -> Weights {
    Weights::parse("FB:25,AAPL:25,NFLX:25,GOOG:25").unwrap()
}

/// Saturday 05-05-2018 start, every 4 days, 5000 per run, 10 commission.
pub fn faang_strategy(name: Option<&str>, end: Option<NaiveDate>) -> Strategy {
    Strategy {
        name: name.map(str::to_string),
        start_date: d(2018, 5, 5),
        end_date: end,
        interval_days: 4,
        amount: 5000.0,
        commission: 10.0,
        weights: faang_weights(),
        next_due_date: None,
    }
}

pub fn model_on(today: NaiveDate) -> PortfolioModel {
    PortfolioModel::new(Box::new(faang_prices()), Box::new(FixedClock(today)))
}
