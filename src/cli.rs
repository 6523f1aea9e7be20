//! CLI definition and dispatch.
//!
//! Every command except `validate` runs one session: load the model from the
//! store, catch up every attached strategy, run the command, save everything
//! back, print the results.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::clock_adapter::{FixedClock, SystemClock};
use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation;
use crate::domain::config_validation::{default_commission, model_settings, validate_config};
use crate::domain::error::StocksimError;
use crate::domain::execution::{self, DATE_FORMAT};
use crate::domain::model::PortfolioModel;
use crate::domain::scheduler::ScheduleReport;
use crate::domain::strategy::Strategy;
use crate::domain::weights::Weights;
use crate::ports::clock_port::ClockPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "stocksim", about = "Stock portfolio simulator")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true, default_value = "stocksim.ini")]
    pub config: PathBuf,
    /// Pretend today is this date (dd-mm-yyyy)
    #[arg(long, global = true)]
    pub today: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WeightArgs {
    /// Ticker weights in percent, e.g. FB:25,AAPL:75
    #[arg(long, conflicts_with = "equal")]
    pub weights: Option<String>,
    /// Split equally across these tickers
    #[arg(long, value_delimiter = ',')]
    pub equal: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub weights: WeightArgs,
    /// Amount invested at every interval
    #[arg(long)]
    pub amount: f64,
    /// First due date (dd-mm-yyyy)
    #[arg(long)]
    pub start: String,
    /// Last date to invest on (dd-mm-yyyy); open-ended if omitted
    #[arg(long)]
    pub end: Option<String>,
    /// Days between executions
    #[arg(long, default_value_t = 30)]
    pub interval: u32,
    #[arg(long)]
    pub commission: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty portfolio
    CreatePortfolio { name: String },
    /// Add a ticker to a portfolio without buying it
    AddStock { portfolio: String, ticker: String },
    /// Buy one stock
    Buy {
        portfolio: String,
        ticker: String,
        #[arg(long)]
        amount: f64,
        /// Purchase time (dd-mm-yyyy HH:MM)
        #[arg(long)]
        at: String,
        #[arg(long)]
        commission: Option<f64>,
    },
    /// Split an amount across weighted stocks
    Invest {
        portfolio: String,
        #[command(flatten)]
        weights: WeightArgs,
        #[arg(long)]
        amount: f64,
        /// Purchase time (dd-mm-yyyy HH:MM)
        #[arg(long)]
        at: String,
        #[arg(long)]
        commission: Option<f64>,
    },
    /// Dollar-cost average into a portfolio
    Dca {
        portfolio: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Register a named strategy without running it
    CreateStrategy {
        name: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Run a named strategy against a portfolio
    ApplyStrategy { name: String, portfolio: String },
    /// Catch up attached strategies and exit
    Resume,
    /// List portfolios and named strategies
    List,
    /// Show a portfolio's holdings and composition
    Show {
        portfolio: String,
        /// As-of date (dd-mm-yyyy); defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Total cost basis as of a date
    CostBasis {
        portfolio: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Market value as of a date
    Value {
        portfolio: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Validate the configuration file
    Validate,
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Command::Validate = cli.command {
        eprintln!("Config validated successfully");
        return ExitCode::SUCCESS;
    }

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match run_session(&config, store.as_ref(), cli.today.as_deref(), cli.command) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

#[cfg(feature = "sqlite")]
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn StorePort>, StocksimError> {
    use crate::adapters::sqlite_adapter::SqliteStore;
    Ok(Box::new(SqliteStore::from_config(config)?))
}

#[cfg(not(feature = "sqlite"))]
pub fn open_store(_config: &dyn ConfigPort) -> Result<Box<dyn StorePort>, StocksimError> {
    use crate::adapters::memory_store::MemoryStore;
    warn!("built without the sqlite feature; nothing will be saved");
    Ok(Box::new(MemoryStore::new()))
}

/// A pinned clock for `--today`, the system clock otherwise.
pub fn build_clock(today: Option<&str>) -> Result<Box<dyn ClockPort>, StocksimError> {
    match today {
        Some(value) => Ok(Box::new(FixedClock(execution::parse_date(value, "today")?))),
        None => Ok(Box::new(SystemClock)),
    }
}

pub fn build_weights(args: &WeightArgs) -> Result<Weights, StocksimError> {
    match &args.weights {
        Some(list) => Weights::parse(list),
        None if !args.equal.is_empty() => Weights::equal(args.equal.as_slice()),
        None => Err(StocksimError::validation(
            "weights",
            "give either --weights or --equal",
        )),
    }
}

pub fn build_strategy(
    name: Option<&str>,
    args: &ScheduleArgs,
    default_commission: f64,
) -> Result<Strategy, StocksimError> {
    let start_date = execution::parse_date(&args.start, "start date")?;
    let end_date = args
        .end
        .as_deref()
        .map(|end| execution::parse_date(end, "end date"))
        .transpose()?;
    Ok(Strategy {
        name: name.map(str::to_string),
        start_date,
        end_date,
        interval_days: args.interval,
        amount: args.amount,
        commission: args.commission.unwrap_or(default_commission),
        weights: build_weights(&args.weights)?,
        next_due_date: None,
    })
}

/// Load, catch up, run `command`, save. Returns the lines to print.
///
/// A strategy that cannot catch up is reported as a line and the command
/// still runs, except `resume`, which fails with that error. The model is
/// saved even when the command fails, so purchases made by the catch-up or
/// by earlier steps of the command are kept.
pub fn run_session(
    config: &dyn ConfigPort,
    store: &dyn StorePort,
    today: Option<&str>,
    command: Command,
) -> Result<Vec<String>, StocksimError> {
    let clock = build_clock(today)?;
    let directory = config
        .get_string("prices", "directory")
        .ok_or_else(|| StocksimError::ConfigMissing {
            section: "prices".to_string(),
            key: "directory".to_string(),
        })?;
    let prices = CsvPriceAdapter::new(PathBuf::from(directory));

    let mut model = PortfolioModel::from_store(store, Box::new(prices), clock)?
        .with_settings(model_settings(config));
    info!(today = %model.today(), portfolios = model.portfolios().count(), "model loaded");

    let catch_up = model.resume_all();
    let mut lines = Vec::new();
    for report in catch_up.reports.iter().filter(|r| !r.is_noop()) {
        lines.extend(format_schedule_report(report));
    }
    lines.extend(catch_up.failures.iter().map(ToString::to_string));

    let commission = default_commission(config);
    let outcome = match command {
        Command::Resume => catch_up
            .into_result()
            .and_then(|_| execute(&mut model, Command::Resume, commission)),
        command => execute(&mut model, command, commission),
    };
    model.persist(store)?;
    lines.extend(outcome?);
    Ok(lines)
}

pub fn execute(
    model: &mut PortfolioModel,
    command: Command,
    default_commission: f64,
) -> Result<Vec<String>, StocksimError> {
    match command {
        Command::CreatePortfolio { name } => {
            let portfolio = model.create_portfolio(&name)?;
            Ok(vec![format!("created portfolio {}", portfolio.name())])
        }
        Command::AddStock { portfolio, ticker } => {
            model.add_stock(&portfolio, &ticker)?;
            Ok(vec![format!(
                "added {} to {}",
                ticker.trim().to_uppercase(),
                portfolio.trim().to_uppercase()
            )])
        }
        Command::Buy {
            portfolio,
            ticker,
            amount,
            at,
            commission,
        } => {
            let holding = model.buy(
                &portfolio,
                &ticker,
                amount,
                &at,
                commission.unwrap_or(default_commission),
            )?;
            Ok(vec![format!(
                "bought {} shares of {} at {:.2} on {}",
                holding.shares(),
                holding.ticker(),
                holding.unit_price(),
                holding.purchase_date().format(DATE_FORMAT)
            )])
        }
        Command::Invest {
            portfolio,
            weights,
            amount,
            at,
            commission,
        } => {
            let weights = build_weights(&weights)?;
            let outcomes = model.invest(
                &portfolio,
                &weights,
                amount,
                commission.unwrap_or(default_commission),
                &at,
            )?;
            Ok(allocation::summarize(&outcomes)
                .lines()
                .map(str::to_string)
                .collect())
        }
        Command::Dca {
            portfolio,
            schedule,
        } => {
            let strategy = build_strategy(None, &schedule, default_commission)?;
            let report = model.dollar_cost_average(&portfolio, strategy)?;
            Ok(format_schedule_report(&report))
        }
        Command::CreateStrategy { name, schedule } => {
            let strategy = build_strategy(Some(&name), &schedule, default_commission)?;
            let created = model.create_strategy(strategy)?;
            Ok(vec![format!("created strategy {}", created.display_name())])
        }
        Command::ApplyStrategy { name, portfolio } => {
            let report = model.apply_strategy(&name, &portfolio)?;
            Ok(format_schedule_report(&report))
        }
        Command::Resume => Ok(vec!["all strategies are up to date".to_string()]),
        Command::List => Ok(format_listing(model)),
        Command::Show { portfolio, date } => {
            let date = as_of(model, date.as_deref())?;
            format_portfolio(model, &portfolio, date)
        }
        Command::CostBasis { portfolio, date } => {
            let date = as_of(model, date.as_deref())?;
            let basis = model.total_cost_basis(&portfolio, date)?;
            Ok(vec![format!(
                "cost basis on {}: {:.2}",
                date.format(DATE_FORMAT),
                basis
            )])
        }
        Command::Value { portfolio, date } => {
            let date = as_of(model, date.as_deref())?;
            let value = model.total_value(&portfolio, date)?;
            Ok(vec![format!(
                "value on {}: {:.2}",
                date.format(DATE_FORMAT),
                value
            )])
        }
        Command::Validate => Ok(vec!["configuration is valid".to_string()]),
    }
}

fn as_of(model: &PortfolioModel, date: Option<&str>) -> Result<NaiveDate, StocksimError> {
    match date {
        Some(value) => execution::parse_date(value, "date"),
        None => Ok(model.today()),
    }
}

pub fn format_schedule_report(report: &ScheduleReport) -> Vec<String> {
    let name = report.strategy.as_deref().unwrap_or("dollar-cost averaging");
    let mut lines = Vec::new();
    for execution in &report.executions {
        lines.push(format!(
            "{} on {} for {}:",
            name,
            execution.date.format(DATE_FORMAT),
            report.portfolio
        ));
        lines.extend(execution.outcomes.iter().map(|o| format!("  {o}")));
    }
    if let Some(next) = report.next_due_date {
        lines.push(format!(
            "{} for {} next due {}",
            name,
            report.portfolio,
            next.format(DATE_FORMAT)
        ));
    }
    lines
}

fn format_listing(model: &PortfolioModel) -> Vec<String> {
    let mut lines = vec!["Portfolios:".to_string()];
    for portfolio in model.portfolios() {
        lines.push(format!(
            "  {} ({} holdings, {} strategies)",
            portfolio.name(),
            portfolio.holdings().len(),
            portfolio.strategies().len()
        ));
    }
    lines.push("Strategies:".to_string());
    for strategy in model.strategies() {
        lines.push(format!(
            "  {} every {} days from {}: {}",
            strategy.display_name(),
            strategy.interval_days,
            strategy.start_date.format(DATE_FORMAT),
            strategy.weights
        ));
    }
    lines
}

fn format_portfolio(
    model: &PortfolioModel,
    name: &str,
    date: NaiveDate,
) -> Result<Vec<String>, StocksimError> {
    let portfolio = model.portfolio(name).ok_or_else(|| StocksimError::NotFound {
        kind: "portfolio",
        name: name.trim().to_uppercase(),
    })?;

    let mut lines = vec![format!(
        "{} as of {}",
        portfolio.name(),
        date.format(DATE_FORMAT)
    )];
    for holding in portfolio.holdings_on(date) {
        lines.push(format!(
            "  {} {:>6} @ {:>10.2}  {}  commission {:.2}",
            holding.ticker(),
            holding.shares(),
            holding.unit_price(),
            holding.purchase_date().format(DATE_FORMAT),
            holding.commission()
        ));
    }
    lines.push("Composition:".to_string());
    for (ticker, shares) in portfolio.composition(date) {
        lines.push(format!("  {ticker}: {shares}"));
    }
    lines.push(format!(
        "Cost basis: {:.2}",
        portfolio.total_cost_basis(date)
    ));
    match model.total_value(name, date) {
        Ok(value) => lines.push(format!("Value: {value:.2}")),
        Err(e) => {
            warn!(portfolio = portfolio.name(), error = %e, "could not value portfolio");
            lines.push(format!("Value: unavailable ({e})"));
        }
    }
    Ok(lines)
}
