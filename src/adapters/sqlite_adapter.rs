//! SQLite portfolio and strategy store.

use crate::domain::config_validation::DEFAULT_POOL_SIZE;
use crate::domain::error::StocksimError;
use crate::domain::holding::Holding;
use crate::domain::portfolio::Portfolio;
use crate::domain::strategy::Strategy;
use crate::domain::weights::Weights;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Transaction, params};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> StocksimError {
    StocksimError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, StocksimError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| StocksimError::Database {
        reason: format!("invalid stored date {value:?}: {e}"),
    })
}

fn parse_optional_date(value: Option<String>) -> Result<Option<NaiveDate>, StocksimError> {
    value.as_deref().map(parse_date).transpose()
}

/// A strategy row before its weights are attached.
struct StrategyRow {
    id: i64,
    name: Option<String>,
    start_date: String,
    end_date: Option<String>,
    interval_days: u32,
    amount: f64,
    commission: f64,
    next_due_date: Option<String>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StocksimError> {
        let db_path =
            config
                .get_string("store", "path")
                .ok_or_else(|| StocksimError::ConfigMissing {
                    section: "store".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("store", "pool_size", DEFAULT_POOL_SIZE) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| StocksimError::Database {
                    reason: e.to_string(),
                })?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StocksimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| StocksimError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StocksimError> {
        self.pool.get().map_err(|e: r2d2::Error| StocksimError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), StocksimError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS portfolios (
                name TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                portfolio TEXT NOT NULL REFERENCES portfolios(name),
                ticker TEXT NOT NULL,
                shares INTEGER NOT NULL,
                unit_price REAL NOT NULL,
                purchase_date TEXT NOT NULL,
                commission REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_holdings_portfolio ON holdings(portfolio);
            CREATE TABLE IF NOT EXISTS declared_tickers (
                portfolio TEXT NOT NULL REFERENCES portfolios(name),
                ticker TEXT NOT NULL,
                PRIMARY KEY (portfolio, ticker)
            );
            CREATE TABLE IF NOT EXISTS strategies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                portfolio TEXT REFERENCES portfolios(name),
                name TEXT,
                start_date TEXT NOT NULL,
                end_date TEXT,
                interval_days INTEGER NOT NULL,
                amount REAL NOT NULL,
                commission REAL NOT NULL,
                next_due_date TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_strategies_portfolio ON strategies(portfolio);
            CREATE TABLE IF NOT EXISTS strategy_weights (
                strategy_id INTEGER NOT NULL REFERENCES strategies(id),
                ticker TEXT NOT NULL,
                percent REAL NOT NULL,
                PRIMARY KEY (strategy_id, ticker)
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    fn insert_strategy(
        tx: &Transaction<'_>,
        portfolio: Option<&str>,
        strategy: &Strategy,
    ) -> Result<(), StocksimError> {
        tx.execute(
            "INSERT INTO strategies
                (portfolio, name, start_date, end_date, interval_days, amount, commission, next_due_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                portfolio,
                strategy.name,
                format_date(strategy.start_date),
                strategy.end_date.map(format_date),
                strategy.interval_days,
                strategy.amount,
                strategy.commission,
                strategy.next_due_date.map(format_date),
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();

        for (ticker, percent) in strategy.weights.iter() {
            tx.execute(
                "INSERT INTO strategy_weights (strategy_id, ticker, percent) VALUES (?1, ?2, ?3)",
                params![id, ticker, percent],
            )
            .map_err(query_err)?;
        }
        Ok(())
    }

    fn delete_strategies(
        tx: &Transaction<'_>,
        where_clause: &str,
        arg: &str,
    ) -> Result<(), StocksimError> {
        tx.execute(
            &format!(
                "DELETE FROM strategy_weights WHERE strategy_id IN (SELECT id FROM strategies WHERE {where_clause})"
            ),
            params![arg],
        )
        .map_err(query_err)?;
        tx.execute(&format!("DELETE FROM strategies WHERE {where_clause}"), params![arg])
            .map_err(query_err)?;
        Ok(())
    }

    fn load_strategy_rows(
        &self,
        portfolio: Option<&str>,
    ) -> Result<Vec<Strategy>, StocksimError> {
        let conn = self.connection()?;
        let query = "SELECT id, name, start_date, end_date, interval_days, amount, commission, next_due_date
                     FROM strategies
                     WHERE (?1 IS NULL AND portfolio IS NULL) OR portfolio = ?1
                     ORDER BY id ASC";
        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt
            .query_map(params![portfolio], |row| {
                Ok(StrategyRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    start_date: row.get(2)?,
                    end_date: row.get(3)?,
                    interval_days: row.get(4)?,
                    amount: row.get(5)?,
                    commission: row.get(6)?,
                    next_due_date: row.get(7)?,
                })
            })
            .map_err(query_err)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row.map_err(query_err)?);
        }

        let mut weight_stmt = conn
            .prepare("SELECT ticker, percent FROM strategy_weights WHERE strategy_id = ?1 ORDER BY ticker")
            .map_err(query_err)?;

        let mut strategies = Vec::with_capacity(raw.len());
        for row in raw {
            let pairs = weight_stmt
                .query_map(params![row.id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?)))
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;
            strategies.push(Strategy {
                name: row.name,
                start_date: parse_date(&row.start_date)?,
                end_date: parse_optional_date(row.end_date)?,
                interval_days: row.interval_days,
                amount: row.amount,
                commission: row.commission,
                weights: Weights::from_pairs(pairs)?,
                next_due_date: parse_optional_date(row.next_due_date)?,
            });
        }
        Ok(strategies)
    }

    fn load_portfolio(&self, name: &str) -> Result<Portfolio, StocksimError> {
        let mut portfolio = Portfolio::new(name)?;
        {
            let conn = self.connection()?;

            let mut holdings_stmt = conn
                .prepare(
                    "SELECT ticker, shares, unit_price, purchase_date, commission
                     FROM holdings WHERE portfolio = ?1 ORDER BY id ASC",
                )
                .map_err(query_err)?;
            let rows = holdings_stmt
                .query_map(params![name], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                })
                .map_err(query_err)?;
            for row in rows {
                let (ticker, shares, unit_price, date, commission) = row.map_err(query_err)?;
                let shares = u64::try_from(shares).map_err(|_| StocksimError::Database {
                    reason: format!("negative share count stored for {ticker}"),
                })?;
                portfolio.add_holding(Holding::new(
                    ticker,
                    shares,
                    unit_price,
                    parse_date(&date)?,
                    commission,
                ));
            }

            let mut declared_stmt = conn
                .prepare("SELECT ticker FROM declared_tickers WHERE portfolio = ?1 ORDER BY ticker")
                .map_err(query_err)?;
            let rows = declared_stmt
                .query_map(params![name], |row| row.get::<_, String>(0))
                .map_err(query_err)?;
            for row in rows {
                portfolio.declare_ticker(row.map_err(query_err)?);
            }
        }

        // The in-memory pool holds a single connection, so the one above
        // must be back in the pool before strategies are read.
        for strategy in self.load_strategy_rows(Some(name))? {
            portfolio.attach_strategy(strategy);
        }
        Ok(portfolio)
    }
}

impl StorePort for SqliteStore {
    fn load_portfolios(&self) -> Result<Vec<Portfolio>, StocksimError> {
        let names: Vec<String> = {
            let conn = self.connection()?;
            let mut stmt = conn
                .prepare("SELECT name FROM portfolios ORDER BY name")
                .map_err(query_err)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(query_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(query_err)?
        };

        names.iter().map(|name| self.load_portfolio(name)).collect()
    }

    fn load_strategies(&self) -> Result<Vec<Strategy>, StocksimError> {
        self.load_strategy_rows(None)
    }

    fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StocksimError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_err)?;
        let name = portfolio.name();

        tx.execute(
            "INSERT OR IGNORE INTO portfolios (name) VALUES (?1)",
            params![name],
        )
        .map_err(query_err)?;
        tx.execute("DELETE FROM holdings WHERE portfolio = ?1", params![name])
            .map_err(query_err)?;
        tx.execute(
            "DELETE FROM declared_tickers WHERE portfolio = ?1",
            params![name],
        )
        .map_err(query_err)?;
        Self::delete_strategies(&tx, "portfolio = ?1", name)?;

        for holding in portfolio.holdings() {
            tx.execute(
                "INSERT INTO holdings (portfolio, ticker, shares, unit_price, purchase_date, commission)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    name,
                    holding.ticker(),
                    holding.shares() as i64,
                    holding.unit_price(),
                    format_date(holding.purchase_date()),
                    holding.commission(),
                ],
            )
            .map_err(query_err)?;
        }
        for ticker in portfolio.declared_tickers() {
            tx.execute(
                "INSERT INTO declared_tickers (portfolio, ticker) VALUES (?1, ?2)",
                params![name, ticker],
            )
            .map_err(query_err)?;
        }
        for strategy in portfolio.strategies() {
            Self::insert_strategy(&tx, Some(name), strategy)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn save_strategy(&self, strategy: &Strategy) -> Result<(), StocksimError> {
        let name = strategy.name.as_deref().ok_or_else(|| {
            StocksimError::validation(
                "strategy name",
                "only named strategies can be saved on their own",
            )
        })?;
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_err)?;
        Self::delete_strategies(&tx, "portfolio IS NULL AND name = ?1", name)?;
        Self::insert_strategy(&tx, None, strategy)?;
        tx.commit().map_err(query_err)?;
        Ok(())
    }
}
