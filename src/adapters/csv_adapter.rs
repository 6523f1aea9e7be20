//! CSV file price adapter.
//!
//! One file per ticker, `<directory>/<TICKER>.csv`, with a header row that
//! has at least `date` (YYYY-MM-DD) and `close` columns. Each file is parsed
//! once and cached for the life of the adapter.

use crate::domain::error::StocksimError;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

type PriceSeries = BTreeMap<NaiveDate, f64>;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
    cache: RefCell<HashMap<String, Option<PriceSeries>>>,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn load_series(&self, ticker: &str) -> Result<Option<PriceSeries>, StocksimError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            debug!(ticker, path = %path.display(), "no price file");
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| StocksimError::PriceSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| StocksimError::PriceSource {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| StocksimError::PriceSource {
                    reason: format!("missing {} column in {}", name, path.display()),
                })
        };
        let date_col = column("date")?;
        let close_col = column("close")?;

        let mut series = PriceSeries::new();
        for result in rdr.records() {
            let record = result.map_err(|e| StocksimError::PriceSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_col).ok_or_else(|| StocksimError::PriceSource {
                reason: "missing date value".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                StocksimError::PriceSource {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            let close: f64 = record
                .get(close_col)
                .ok_or_else(|| StocksimError::PriceSource {
                    reason: "missing close value".into(),
                })?
                .trim()
                .parse()
                .map_err(|e| StocksimError::PriceSource {
                    reason: format!("invalid close value: {}", e),
                })?;

            series.insert(date, close);
        }

        Ok(Some(series))
    }

    fn with_series<T>(
        &self,
        ticker: &str,
        f: impl FnOnce(Option<&PriceSeries>) -> T,
    ) -> Result<T, StocksimError> {
        let ticker = ticker.to_uppercase();
        if !self.cache.borrow().contains_key(&ticker) {
            let series = self.load_series(&ticker)?;
            self.cache.borrow_mut().insert(ticker.clone(), series);
        }
        let cache = self.cache.borrow();
        Ok(f(cache.get(&ticker).and_then(Option::as_ref)))
    }
}

impl PricePort for CsvPriceAdapter {
    fn closing_price(&self, ticker: &str, date: NaiveDate) -> Result<Option<f64>, StocksimError> {
        self.with_series(ticker, |series| series.and_then(|s| s.get(&date).copied()))
    }

    fn price_on_or_before(
        &self,
        ticker: &str,
        date: NaiveDate,
        lookback_days: u32,
    ) -> Result<Option<f64>, StocksimError> {
        let earliest = date - chrono::Duration::days(i64::from(lookback_days));
        self.with_series(ticker, |series| {
            series.and_then(|s| s.range(earliest..=date).next_back().map(|(_, p)| *p))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2018-05-03,174.0,175.0,173.0,174.5,50000\n\
            2018-05-04,175.0,177.0,174.0,176.6,60000\n\
            2018-05-07,177.0,178.0,176.0,177.9,55000\n";

        fs::write(path.join("FB.csv"), csv_content).unwrap();
        fs::write(path.join("AAPL.csv"), "date,close\n2018-05-07,185.2\n").unwrap();
        fs::write(path.join("BAD.csv"), "date,close\n07-05-2018,1.0\n").unwrap();
        fs::write(path.join("NOCLOSE.csv"), "date,open\n2018-05-07,1.0\n").unwrap();

        (dir, path)
    }

    #[test]
    fn closing_price_reads_close_column() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);

        assert_eq!(adapter.closing_price("FB", d(2018, 5, 4)).unwrap(), Some(176.6));
        assert_eq!(adapter.closing_price("fb", d(2018, 5, 7)).unwrap(), Some(177.9));
        assert_eq!(adapter.closing_price("AAPL", d(2018, 5, 7)).unwrap(), Some(185.2));
    }

    #[test]
    fn missing_day_is_unknown() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert_eq!(adapter.closing_price("FB", d(2018, 5, 5)).unwrap(), None);
    }

    #[test]
    fn missing_file_is_unknown_not_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert_eq!(adapter.closing_price("XYZ", d(2018, 5, 7)).unwrap(), None);
    }

    #[test]
    fn malformed_file_is_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert!(adapter.closing_price("BAD", d(2018, 5, 7)).is_err());
        assert!(adapter.closing_price("NOCLOSE", d(2018, 5, 7)).is_err());
    }

    #[test]
    fn price_on_or_before_uses_latest_prior_close() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path);
        assert_eq!(adapter.price_on_or_before("FB", d(2018, 5, 6), 10).unwrap(), Some(176.6));
        assert_eq!(adapter.price_on_or_before("FB", d(2018, 5, 6), 1).unwrap(), None);
        assert_eq!(adapter.price_on_or_before("FB", d(2018, 5, 2), 10).unwrap(), None);
    }

    #[test]
    fn cached_after_first_read() {
        let (dir, path) = setup_test_data();
        let adapter = CsvPriceAdapter::new(path.clone());
        assert_eq!(adapter.closing_price("AAPL", d(2018, 5, 7)).unwrap(), Some(185.2));
        fs::write(path.join("AAPL.csv"), "date,close\n2018-05-07,1.0\n").unwrap();
        assert_eq!(adapter.closing_price("AAPL", d(2018, 5, 7)).unwrap(), Some(185.2));
        drop(dir);
    }
}
