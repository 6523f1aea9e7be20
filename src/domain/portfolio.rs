//! Named collections of holdings.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::error::StocksimError;
use super::holding::Holding;
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    name: String,
    holdings: Vec<Holding>,
    declared_tickers: BTreeSet<String>,
    strategies: Vec<Strategy>,
}

impl Portfolio {
    pub fn new(name: &str) -> Result<Self, StocksimError> {
        Ok(Portfolio {
            name: canonical_name(name)?,
            holdings: Vec::new(),
            declared_tickers: BTreeSet::new(),
            strategies: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Holdings in purchase order.
    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn declared_tickers(&self) -> &BTreeSet<String> {
        &self.declared_tickers
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub(crate) fn strategies_mut(&mut self) -> &mut Vec<Strategy> {
        &mut self.strategies
    }

    pub(crate) fn add_holding(&mut self, holding: Holding) {
        self.holdings.push(holding);
    }

    pub(crate) fn declare_ticker(&mut self, ticker: String) {
        self.declared_tickers.insert(ticker);
    }

    pub(crate) fn attach_strategy(&mut self, strategy: Strategy) {
        self.strategies.push(strategy);
    }

    /// A portfolio that has had a strategy attached only takes allocation-driven lots.
    pub fn is_strategy_managed(&self) -> bool {
        !self.strategies.is_empty()
    }

    pub fn holdings_on(&self, date: NaiveDate) -> impl Iterator<Item = &Holding> {
        self.holdings.iter().filter(move |h| h.is_held_on(date))
    }

    pub fn total_cost_basis(&self, date: NaiveDate) -> f64 {
        self.holdings_on(date).map(Holding::cost_basis).sum()
    }

    /// Shares per ticker held on `date`. Declared tickers with nothing bought
    /// show up with zero shares.
    pub fn composition(&self, date: NaiveDate) -> BTreeMap<String, u64> {
        let mut shares: BTreeMap<String, u64> = self
            .declared_tickers
            .iter()
            .map(|t| (t.clone(), 0))
            .collect();
        for holding in self.holdings_on(date) {
            *shares.entry(holding.ticker().to_string()).or_insert(0) += holding.shares();
        }
        shares
    }
}

/// Trimmed, uppercased portfolio name; the portfolio's identity.
pub fn canonical_name(name: &str) -> Result<String, StocksimError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StocksimError::validation(
            "portfolio name",
            "name must not be empty",
        ));
    }
    Ok(trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_portfolio() -> Portfolio {
        let mut p = Portfolio::new("retirement").unwrap();
        p.add_holding(Holding::new("AAPL", 7, 165.0, d(2018, 5, 7), 10.0));
        p.add_holding(Holding::new("FB", 6, 185.0, d(2018, 5, 11), 10.0));
        p.add_holding(Holding::new("AAPL", 2, 170.0, d(2018, 5, 15), 0.0));
        p
    }

    #[test]
    fn name_is_canonicalised() {
        let p = Portfolio::new("  retirement ").unwrap();
        assert_eq!(p.name(), "RETIREMENT");
    }

    #[test]
    fn blank_name_rejected() {
        assert!(Portfolio::new("   ").is_err());
    }

    #[test]
    fn holdings_keep_purchase_order() {
        let p = sample_portfolio();
        let tickers: Vec<&str> = p.holdings().iter().map(|h| h.ticker()).collect();
        assert_eq!(tickers, vec!["AAPL", "FB", "AAPL"]);
    }

    #[test]
    fn cost_basis_excludes_later_purchases() {
        let p = sample_portfolio();
        assert_eq!(p.total_cost_basis(d(2018, 5, 6)), 0.0);
        assert!((p.total_cost_basis(d(2018, 5, 7)) - 1165.0).abs() < 1e-9);
        assert!((p.total_cost_basis(d(2018, 5, 11)) - 2285.0).abs() < 1e-9);
        assert!((p.total_cost_basis(d(2018, 12, 31)) - 2625.0).abs() < 1e-9);
    }

    #[test]
    fn composition_sums_lots_and_lists_declared() {
        let mut p = sample_portfolio();
        p.declare_ticker("NFLX".into());
        let comp = p.composition(d(2018, 5, 20));
        assert_eq!(comp.get("AAPL"), Some(&9));
        assert_eq!(comp.get("FB"), Some(&6));
        assert_eq!(comp.get("NFLX"), Some(&0));

        let early = p.composition(d(2018, 5, 8));
        assert_eq!(early.get("AAPL"), Some(&7));
        assert_eq!(early.get("FB"), None);
    }

    #[test]
    fn strategy_managed_after_attach() {
        let mut p = Portfolio::new("dca").unwrap();
        assert!(!p.is_strategy_managed());
        p.attach_strategy(Strategy {
            name: None,
            start_date: d(2018, 5, 5),
            end_date: None,
            interval_days: 7,
            amount: 100.0,
            commission: 0.0,
            weights: crate::domain::weights::Weights::parse("FB:100").unwrap(),
            next_due_date: None,
        });
        assert!(p.is_strategy_managed());
    }
}
