//! Ticker weightings for invest and strategy allocations.
//!
//! Weights are percentages keyed by canonical (uppercase) ticker. A valid
//! allocation sums to somewhere in [99, 100]; the point of slack under 100
//! absorbs repeating-decimal equal splits such as 100/3.

use crate::domain::error::StocksimError;
use std::collections::BTreeMap;

pub const MIN_WEIGHT_SUM: f64 = 99.0;
pub const MAX_WEIGHT_SUM: f64 = 100.0;
/// Slack on both band edges for float error in decimal sums.
const SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    entries: BTreeMap<String, f64>,
}

impl Weights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(ticker, percent)` pairs. Tickers are canonicalised and a
    /// repeated ticker is rejected.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, StocksimError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut weights = Weights::new();
        for (ticker, percent) in pairs {
            weights.insert(ticker.as_ref(), percent)?;
        }
        Ok(weights)
    }

    /// Parse `"FB:25,AAPL:25,NFLX:50"`.
    pub fn parse(input: &str) -> Result<Self, StocksimError> {
        let mut weights = Weights::new();
        for token in input.split(',') {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                return Err(StocksimError::validation("weights", "empty token in weight list"));
            }
            let (ticker, percent) = trimmed.split_once(':').ok_or_else(|| {
                StocksimError::validation(
                    "weights",
                    format!("expected TICKER:PERCENT, got {trimmed}"),
                )
            })?;
            let percent: f64 = percent.trim().parse().map_err(|_| {
                StocksimError::validation(
                    "weights",
                    format!("invalid percentage for {}", ticker.trim()),
                )
            })?;
            weights.insert(ticker, percent)?;
        }
        Ok(weights)
    }

    /// Split 100% evenly across `tickers`, each share truncated to two
    /// decimal places so the total never exceeds 100.
    pub fn equal<S: AsRef<str>>(tickers: &[S]) -> Result<Self, StocksimError> {
        if tickers.is_empty() {
            return Err(StocksimError::validation("weights", "no tickers given"));
        }
        let share = (10_000.0 / tickers.len() as f64).floor() / 100.0;
        Self::from_pairs(tickers.iter().map(|t| (t.as_ref(), share)))
    }

    fn insert(&mut self, ticker: &str, percent: f64) -> Result<(), StocksimError> {
        let ticker = canonical_ticker(ticker)?;
        if !percent.is_finite() || percent < 0.0 {
            return Err(StocksimError::validation(
                "weights",
                format!("weight for {ticker} must be non-negative"),
            ));
        }
        if self.entries.contains_key(&ticker) {
            return Err(StocksimError::validation(
                "weights",
                format!("duplicate ticker {ticker}"),
            ));
        }
        self.entries.insert(ticker, percent);
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Reject anything outside the [99, 100] band before a purchase happens.
    pub fn validate(&self) -> Result<(), StocksimError> {
        let sum = self.sum();
        if sum < MIN_WEIGHT_SUM - SUM_TOLERANCE || sum > MAX_WEIGHT_SUM + SUM_TOLERANCE {
            return Err(StocksimError::validation(
                "weights",
                format!(
                    "weights sum to {sum}, expected between {MIN_WEIGHT_SUM} and {MAX_WEIGHT_SUM}"
                ),
            ));
        }
        Ok(())
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.entries.get(&ticker.trim().to_uppercase()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for Weights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|(t, w)| format!("{t}:{w}")).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Trimmed, uppercased ticker; empty input is a validation error.
pub fn canonical_ticker(ticker: &str) -> Result<String, StocksimError> {
    let trimmed = ticker.trim();
    if trimmed.is_empty() {
        return Err(StocksimError::validation("ticker", "ticker must not be empty"));
    }
    Ok(trimmed.to_uppercase())
}
