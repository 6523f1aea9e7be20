//! Historical price lookup port.

use crate::domain::error::StocksimError;
use chrono::NaiveDate;

pub trait PricePort {
    /// Closing price of `ticker` on `date`, or `None` when the source has no
    /// data for that day. Must be deterministic within one process run.
    fn closing_price(&self, ticker: &str, date: NaiveDate) -> Result<Option<f64>, StocksimError>;

    /// Closing price on `date` or the nearest earlier day that has one,
    /// looking back at most `lookback_days` days.
    fn price_on_or_before(
        &self,
        ticker: &str,
        date: NaiveDate,
        lookback_days: u32,
    ) -> Result<Option<f64>, StocksimError> {
        let mut day = date;
        for _ in 0..=lookback_days {
            if let Some(price) = self.closing_price(ticker, day)? {
                return Ok(Some(price));
            }
            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }
        Ok(None)
    }
}
