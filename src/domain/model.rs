//! The portfolio model: every portfolio, the named strategy registry, and
//! the operations the front end calls.
//!
//! Portfolios are created on first reference by any operation that buys,
//! declares a ticker or attaches a strategy. Named strategies are templates;
//! applying one attaches a fresh live copy to a portfolio.

use chrono::NaiveDate;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

use super::allocation::{self, AllocationOutcome};
use super::calendar;
use super::error::StocksimError;
use super::execution;
use super::holding::Holding;
use super::portfolio::{Portfolio, canonical_name};
use super::scheduler::{self, ScheduleReport};
use super::strategy::Strategy;
use super::weights::{Weights, canonical_ticker};
use crate::ports::clock_port::ClockPort;
use crate::ports::price_port::PricePort;
use crate::ports::store_port::StorePort;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    /// How many days valuation walks back looking for a closing price.
    pub lookback_days: u32,
    /// Refuse direct buys on portfolios that have a strategy attached.
    pub strict_strategy_portfolios: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            strict_strategy_portfolios: true,
        }
    }
}

/// What [`PortfolioModel::resume_all`] did.
#[derive(Debug, Default)]
pub struct CatchUp {
    pub reports: Vec<ScheduleReport>,
    pub failures: Vec<CatchUpFailure>,
}

impl CatchUp {
    /// The reports, or the first failure if any strategy did not catch up.
    pub fn into_result(self) -> Result<Vec<ScheduleReport>, StocksimError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.reports),
        }
    }
}

/// A strategy whose catch-up stopped on `due`.
#[derive(Debug)]
pub struct CatchUpFailure {
    pub portfolio: String,
    pub strategy: Option<String>,
    pub due: NaiveDate,
    pub error: StocksimError,
}

impl fmt::Display for CatchUpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} for {} stopped on {}: {}",
            self.strategy.as_deref().unwrap_or("dollar-cost averaging"),
            self.portfolio,
            self.due.format(execution::DATE_FORMAT),
            self.error
        )
    }
}

pub struct PortfolioModel {
    portfolios: BTreeMap<String, Portfolio>,
    strategies: BTreeMap<String, Strategy>,
    prices: Box<dyn PricePort>,
    clock: Box<dyn ClockPort>,
    settings: ModelSettings,
}

impl PortfolioModel {
    pub fn new(prices: Box<dyn PricePort>, clock: Box<dyn ClockPort>) -> Self {
        PortfolioModel {
            portfolios: BTreeMap::new(),
            strategies: BTreeMap::new(),
            prices,
            clock,
            settings: ModelSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build a model from everything `store` holds. Strategies are not run;
    /// call [`PortfolioModel::resume_all`] for that.
    pub fn from_store(
        store: &dyn StorePort,
        prices: Box<dyn PricePort>,
        clock: Box<dyn ClockPort>,
    ) -> Result<Self, StocksimError> {
        let mut model = PortfolioModel::new(prices, clock);
        for portfolio in store.load_portfolios()? {
            model
                .portfolios
                .insert(portfolio.name().to_string(), portfolio);
        }
        for strategy in store.load_strategies()? {
            let name = strategy
                .name
                .as_deref()
                .map(canonical_strategy_name)
                .transpose()?
                .ok_or_else(|| {
                    StocksimError::validation("strategy name", "stored template has no name")
                })?;
            model.strategies.insert(name, strategy);
        }
        Ok(model)
    }

    /// Save every portfolio (with its strategy cursors) and every template.
    pub fn persist(&self, store: &dyn StorePort) -> Result<(), StocksimError> {
        for portfolio in self.portfolios.values() {
            store.save_portfolio(portfolio)?;
        }
        for strategy in self.strategies.values() {
            store.save_strategy(strategy)?;
        }
        Ok(())
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn settings(&self) -> ModelSettings {
        self.settings
    }

    pub fn portfolio(&self, name: &str) -> Option<&Portfolio> {
        let name = canonical_name(name).ok()?;
        self.portfolios.get(&name)
    }

    pub fn portfolios(&self) -> impl Iterator<Item = &Portfolio> {
        self.portfolios.values()
    }

    pub fn strategy(&self, name: &str) -> Option<&Strategy> {
        let name = canonical_strategy_name(name).ok()?;
        self.strategies.get(&name)
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    pub fn create_portfolio(&mut self, name: &str) -> Result<&Portfolio, StocksimError> {
        let name = canonical_name(name)?;
        match self.portfolios.entry(name) {
            Entry::Occupied(e) => Err(StocksimError::Conflict {
                kind: "portfolio",
                name: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                let portfolio = Portfolio::new(e.key())?;
                Ok(e.insert(portfolio))
            }
        }
    }

    /// Declare `ticker` on a portfolio without buying it.
    pub fn add_stock(&mut self, portfolio: &str, ticker: &str) -> Result<(), StocksimError> {
        let ticker = canonical_ticker(ticker)?;
        let name = canonical_name(portfolio)?;
        portfolio_entry(&mut self.portfolios, name)?.declare_ticker(ticker);
        Ok(())
    }

    /// Buy `ticker` with `amount` at a `dd-mm-yyyy HH:MM` timestamp.
    pub fn buy(
        &mut self,
        portfolio: &str,
        ticker: &str,
        amount: f64,
        timestamp: &str,
        commission: f64,
    ) -> Result<Holding, StocksimError> {
        canonical_ticker(ticker)?;
        let name = canonical_name(portfolio)?;
        if self.settings.strict_strategy_portfolios
            && self
                .portfolios
                .get(&name)
                .is_some_and(Portfolio::is_strategy_managed)
        {
            return Err(StocksimError::StrategyManaged { portfolio: name });
        }

        let holding = execution::execute_purchase_at(
            self.prices.as_ref(),
            self.clock.today(),
            ticker,
            amount,
            commission,
            timestamp,
        )?;
        portfolio_entry(&mut self.portfolios, name)?.add_holding(holding.clone());
        Ok(holding)
    }

    /// Split `total_amount` across `weights` in one go.
    pub fn invest(
        &mut self,
        portfolio: &str,
        weights: &Weights,
        total_amount: f64,
        commission: f64,
        timestamp: &str,
    ) -> Result<Vec<AllocationOutcome>, StocksimError> {
        let name = canonical_name(portfolio)?;
        if timestamp.trim().is_empty() {
            return Err(StocksimError::validation(
                "timestamp",
                "timestamp must not be empty",
            ));
        }
        allocation::validate_allocation(weights, total_amount, commission)?;
        let at = execution::parse_timestamp(timestamp)?;
        execution::check_trading_window(at)?;

        let today = self.clock.today();
        let prices = self.prices.as_ref();
        let target = portfolio_entry(&mut self.portfolios, name)?;
        allocation::invest(target, prices, today, weights, total_amount, commission, at)
    }

    /// Attach an anonymous recurring allocation to a portfolio and run it up
    /// to today. The strategy stays attached even if a step fails, with its
    /// cursor on that step; the failed step bought nothing and is retried by
    /// the next [`PortfolioModel::resume_all`].
    pub fn dollar_cost_average(
        &mut self,
        portfolio: &str,
        strategy: Strategy,
    ) -> Result<ScheduleReport, StocksimError> {
        let name = canonical_name(portfolio)?;
        let live = Strategy {
            name: None,
            ..strategy.instantiate()
        };
        live.validate()?;
        self.attach_and_run(name, live)
    }

    /// Register a named template. Nothing is executed.
    pub fn create_strategy(&mut self, strategy: Strategy) -> Result<&Strategy, StocksimError> {
        let name = strategy
            .name
            .as_deref()
            .map(canonical_strategy_name)
            .transpose()?
            .ok_or_else(|| StocksimError::validation("strategy name", "name must not be empty"))?;
        let template = Strategy {
            name: Some(name.clone()),
            ..strategy.instantiate()
        };
        template.validate()?;

        match self.strategies.entry(name) {
            Entry::Occupied(e) => Err(StocksimError::Conflict {
                kind: "strategy",
                name: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                info!(strategy = e.key().as_str(), "strategy registered");
                Ok(e.insert(template))
            }
        }
    }

    /// Attach a live copy of the named template to `portfolio` and run it.
    pub fn apply_strategy(
        &mut self,
        strategy: &str,
        portfolio: &str,
    ) -> Result<ScheduleReport, StocksimError> {
        let key = canonical_strategy_name(strategy)?;
        let live = self
            .strategies
            .get(&key)
            .map(Strategy::instantiate)
            .ok_or(StocksimError::NotFound {
                kind: "strategy",
                name: key,
            })?;
        let name = canonical_name(portfolio)?;
        self.attach_and_run(name, live)
    }

    /// Catch up every strategy attached to every portfolio. A failing
    /// strategy keeps its cursor on the failed step and is reported in
    /// [`CatchUp::failures`]; the others still run.
    pub fn resume_all(&mut self) -> CatchUp {
        let today = self.clock.today();
        let prices = self.prices.as_ref();
        let mut catch_up = CatchUp::default();

        for portfolio in self.portfolios.values_mut() {
            let mut strategies = std::mem::take(portfolio.strategies_mut());
            for strategy in strategies.iter_mut() {
                match scheduler::run_strategy(strategy, portfolio, prices, today) {
                    Ok(report) => catch_up.reports.push(report),
                    Err(error) => {
                        warn!(
                            portfolio = portfolio.name(),
                            strategy = strategy.display_name(),
                            due = %strategy.cursor(),
                            error = %error,
                            "strategy could not catch up"
                        );
                        catch_up.failures.push(CatchUpFailure {
                            portfolio: portfolio.name().to_string(),
                            strategy: strategy.name.clone(),
                            due: strategy.cursor(),
                            error,
                        });
                    }
                }
            }
            *portfolio.strategies_mut() = strategies;
        }
        catch_up
    }

    /// Capital spent on holdings bought on or before `date`, commissions included.
    pub fn total_cost_basis(&self, portfolio: &str, date: NaiveDate) -> Result<f64, StocksimError> {
        Ok(self.existing(portfolio)?.total_cost_basis(date))
    }

    /// Market value on `date`, priced at the most recent trading day on or
    /// before it.
    pub fn total_value(&self, portfolio: &str, date: NaiveDate) -> Result<f64, StocksimError> {
        let portfolio = self.existing(portfolio)?;
        let priced_on = calendar::previous_trading_day(date);

        let mut closes: BTreeMap<&str, f64> = BTreeMap::new();
        let mut total = 0.0;
        for holding in portfolio.holdings_on(priced_on) {
            let price = match closes.get(holding.ticker()) {
                Some(price) => *price,
                None => {
                    let price = self
                        .prices
                        .price_on_or_before(
                            holding.ticker(),
                            priced_on,
                            self.settings.lookback_days,
                        )?
                        .ok_or_else(|| StocksimError::UnknownPrice {
                            ticker: holding.ticker().to_string(),
                            date: priced_on,
                        })?;
                    closes.insert(holding.ticker(), price);
                    price
                }
            };
            total += holding.market_value(price);
        }
        Ok(total)
    }

    pub fn composition(
        &self,
        portfolio: &str,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, u64>, StocksimError> {
        Ok(self.existing(portfolio)?.composition(date))
    }

    fn existing(&self, portfolio: &str) -> Result<&Portfolio, StocksimError> {
        let name = canonical_name(portfolio)?;
        self.portfolios
            .get(&name)
            .ok_or(StocksimError::NotFound {
                kind: "portfolio",
                name,
            })
    }

    fn attach_and_run(
        &mut self,
        portfolio: String,
        mut live: Strategy,
    ) -> Result<ScheduleReport, StocksimError> {
        let today = self.clock.today();
        let prices = self.prices.as_ref();
        let target = portfolio_entry(&mut self.portfolios, portfolio)?;
        let result = scheduler::run_strategy(&mut live, target, prices, today);
        target.attach_strategy(live);
        result
    }
}

fn portfolio_entry(
    portfolios: &mut BTreeMap<String, Portfolio>,
    name: String,
) -> Result<&mut Portfolio, StocksimError> {
    match portfolios.entry(name) {
        Entry::Occupied(e) => Ok(e.into_mut()),
        Entry::Vacant(e) => {
            let portfolio = Portfolio::new(e.key())?;
            Ok(e.insert(portfolio))
        }
    }
}

/// Strategy names are trimmed but keep their case.
pub fn canonical_strategy_name(name: &str) -> Result<String, StocksimError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StocksimError::validation(
            "strategy name",
            "name must not be empty",
        ));
    }
    Ok(trimmed.to_string())
}
