//! In-process store.

use crate::domain::error::StocksimError;
use crate::domain::portfolio::Portfolio;
use crate::domain::strategy::Strategy;
use crate::ports::store_port::StorePort;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Keeps saved portfolios and strategies in memory; saving replaces any
/// previous record with the same name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    portfolios: RefCell<BTreeMap<String, Portfolio>>,
    strategies: RefCell<BTreeMap<String, Strategy>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorePort for MemoryStore {
    fn load_portfolios(&self) -> Result<Vec<Portfolio>, StocksimError> {
        Ok(self.portfolios.borrow().values().cloned().collect())
    }

    fn load_strategies(&self) -> Result<Vec<Strategy>, StocksimError> {
        Ok(self.strategies.borrow().values().cloned().collect())
    }

    fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StocksimError> {
        self.portfolios
            .borrow_mut()
            .insert(portfolio.name().to_string(), portfolio.clone());
        Ok(())
    }

    fn save_strategy(&self, strategy: &Strategy) -> Result<(), StocksimError> {
        let name = strategy.name.clone().ok_or_else(|| {
            StocksimError::validation(
                "strategy name",
                "only named strategies can be saved on their own",
            )
        })?;
        self.strategies.borrow_mut().insert(name, strategy.clone());
        Ok(())
    }
}
