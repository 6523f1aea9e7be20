//! Persistence port for portfolios and named strategies.

use crate::domain::error::StocksimError;
use crate::domain::portfolio::Portfolio;
use crate::domain::strategy::Strategy;

/// Storage for the model. Portfolios are saved whole, including their
/// attached strategies and resume cursors; `save_strategy` is for named
/// registry templates only.
pub trait StorePort {
    fn load_portfolios(&self) -> Result<Vec<Portfolio>, StocksimError>;

    fn load_strategies(&self) -> Result<Vec<Strategy>, StocksimError>;

    fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StocksimError>;

    fn save_strategy(&self, strategy: &Strategy) -> Result<(), StocksimError>;
}
