//! CLI integration tests for session orchestration.
//!
//! Tests cover:
//! - Argument parsing into commands
//! - Building weights and strategies from arguments
//! - Full sessions against CSV price files and a SQLite database on disk
//! - Catch-up on the next invocation after the clock moves forward

mod common;

use clap::Parser;
use common::d;
use std::fs;
use std::io::Write;
use std::path::Path;
use stocksim::adapters::file_config_adapter::FileConfigAdapter;
use stocksim::adapters::sqlite_adapter::SqliteStore;
use stocksim::cli::{self, Cli, Command, ScheduleArgs, WeightArgs};
use stocksim::domain::config_validation::validate_config;
use stocksim::domain::error::StocksimError;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn write_prices(dir: &Path, ticker: &str, close: f64) {
    let mut csv = String::from("date,open,high,low,close,volume\n");
    for day in d(2018, 5, 1).iter_days().take(61) {
        csv.push_str(&format!(
            "{},{close},{close},{close},{close},1000\n",
            day.format("%Y-%m-%d")
        ));
    }
    fs::write(dir.join(format!("{ticker}.csv")), csv).unwrap();
}

/// Price directory plus database file, and the INI text pointing at both.
fn workspace() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let prices = dir.path().join("prices");
    fs::create_dir(&prices).unwrap();
    write_prices(&prices, "FB", 185.0);
    write_prices(&prices, "AAPL", 165.0);
    write_prices(&prices, "NFLX", 326.0);
    write_prices(&prices, "GOOG", 1054.0);

    let ini = format!(
        "[prices]\ndirectory = {}\n\n[store]\npath = {}\n\n[trading]\ncommission = 2.5\n",
        prices.display(),
        dir.path().join("stocksim.db").display()
    );
    (dir, ini)
}

fn session(ini: &str, today: &str, args: &[&str]) -> Result<Vec<String>, StocksimError> {
    let config = FileConfigAdapter::from_string(ini).unwrap();
    validate_config(&config).unwrap();
    let store = SqliteStore::from_config(&config).unwrap();
    let mut argv = vec!["stocksim"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    cli::run_session(&config, &store, Some(today), cli.command)
}

mod argument_parsing {
    use super::*;

    #[test]
    fn buy_with_global_flags() {
        let cli = Cli::try_parse_from([
            "stocksim",
            "--config",
            "sim.ini",
            "buy",
            "growth",
            "AAPL",
            "--amount",
            "1000",
            "--at",
            "07-05-2018 10:00",
            "--today",
            "31-12-2018",
        ])
        .unwrap();
        assert_eq!(cli.config, Path::new("sim.ini"));
        assert_eq!(cli.today.as_deref(), Some("31-12-2018"));
        match cli.command {
            Command::Buy {
                portfolio,
                ticker,
                amount,
                at,
                commission,
            } => {
                assert_eq!(portfolio, "growth");
                assert_eq!(ticker, "AAPL");
                assert_eq!(amount, 1000.0);
                assert_eq!(at, "07-05-2018 10:00");
                assert_eq!(commission, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn weights_and_equal_conflict() {
        let result = Cli::try_parse_from([
            "stocksim",
            "invest",
            "p",
            "--weights",
            "FB:100",
            "--equal",
            "FB,AAPL",
            "--amount",
            "100",
            "--at",
            "07-05-2018 10:00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn config_defaults_to_local_file() {
        let cli = Cli::try_parse_from(["stocksim", "list"]).unwrap();
        assert_eq!(cli.config, Path::new("stocksim.ini"));
        assert!(matches!(cli.command, Command::List));
    }
}

mod argument_building {
    use super::*;

    fn schedule(weights: WeightArgs) -> ScheduleArgs {
        ScheduleArgs {
            weights,
            amount: 5000.0,
            start: "05-05-2018".to_string(),
            end: Some("30-06-2018".to_string()),
            interval: 4,
            commission: None,
        }
    }

    #[test]
    fn equal_weights_split_evenly() {
        let weights = cli::build_weights(&WeightArgs {
            weights: None,
            equal: vec!["FB".into(), "AAPL".into(), "NFLX".into()],
        })
        .unwrap();
        assert_eq!(weights.len(), 3);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn missing_weights_rejected() {
        assert!(cli::build_weights(&WeightArgs::default()).is_err());
    }

    #[test]
    fn strategy_uses_default_commission() {
        let args = schedule(WeightArgs {
            weights: Some("FB:50,AAPL:50".into()),
            equal: Vec::new(),
        });
        let strategy = cli::build_strategy(Some("half"), &args, 2.5).unwrap();
        assert_eq!(strategy.name.as_deref(), Some("half"));
        assert_eq!(strategy.start_date, d(2018, 5, 5));
        assert_eq!(strategy.end_date, Some(d(2018, 6, 30)));
        assert_eq!(strategy.commission, 2.5);
        assert_eq!(strategy.next_due_date, None);
    }

    #[test]
    fn iso_dates_rejected() {
        let mut args = schedule(WeightArgs {
            weights: Some("FB:100".into()),
            equal: Vec::new(),
        });
        args.start = "2018-05-05".to_string();
        assert!(cli::build_strategy(None, &args, 0.0).is_err());
    }

    #[test]
    fn today_flag_pins_clock() {
        let clock = cli::build_clock(Some("07-05-2018")).unwrap();
        assert_eq!(clock.today(), d(2018, 5, 7));
        assert!(cli::build_clock(Some("tomorrow")).is_err());
    }
}

mod sessions {
    use super::*;

    #[test]
    fn validate_rejects_config_without_store() {
        let file = write_temp_ini("[prices]\ndirectory = ./prices\n");
        let config = cli::load_config(file.path()).unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(StocksimError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn buy_then_value_across_invocations() {
        let (_dir, ini) = workspace();
        let lines = session(
            &ini,
            "31-12-2018",
            &["buy", "growth", "aapl", "--amount", "1000", "--at", "07-05-2018 10:00"],
        )
        .unwrap();
        assert_eq!(lines, vec!["bought 6 shares of AAPL at 165.00 on 07-05-2018"]);

        let args = ["cost-basis", "growth", "--date", "07-05-2018"];
        let lines = session(&ini, "31-12-2018", &args).unwrap();
        // 6 * 165 + 2.5 default commission
        assert_eq!(lines, vec!["cost basis on 07-05-2018: 992.50"]);

        let args = ["value", "growth", "--date", "06-05-2018"];
        let lines = session(&ini, "31-12-2018", &args).unwrap();
        assert_eq!(lines, vec!["value on 06-05-2018: 0.00"]);
    }

    #[test]
    fn invest_reports_each_ticker() {
        let (_dir, ini) = workspace();
        let lines = session(
            &ini,
            "31-12-2018",
            &[
                "invest",
                "p",
                "--weights",
                "FB:25,AAPL:25,NFLX:25,GOOG:25",
                "--amount",
                "2000",
                "--at",
                "07-05-2018 15:59",
            ],
        )
        .unwrap();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().any(|l| l.starts_with("could not buy GOOG")));
    }

    #[test]
    fn duplicate_portfolio_fails_with_conflict() {
        let (_dir, ini) = workspace();
        session(&ini, "31-12-2018", &["create-portfolio", "growth"]).unwrap();
        let err = session(&ini, "31-12-2018", &["create-portfolio", "GROWTH"]).unwrap_err();
        assert!(matches!(err, StocksimError::Conflict { .. }));
    }

    const DCA_FAANG: [&str; 12] = [
        "dca",
        "faang",
        "--weights",
        "FB:25,AAPL:25,NFLX:25,GOOG:25",
        "--amount",
        "5000",
        "--start",
        "05-05-2018",
        "--interval",
        "4",
        "--commission",
        "10",
    ];

    #[test]
    fn dca_catches_up_on_next_invocation() {
        let (_dir, ini) = workspace();
        let lines = session(&ini, "08-05-2018", &DCA_FAANG).unwrap();
        assert!(lines.iter().any(|l| l.contains("on 07-05-2018 for FAANG")));
        assert!(lines.iter().any(|l| l.ends_with("next due 11-05-2018")));

        // Nothing new when the clock has not moved.
        let lines = session(&ini, "08-05-2018", &["resume"]).unwrap();
        assert_eq!(lines, vec!["all strategies are up to date"]);

        let lines = session(&ini, "16-05-2018", &["resume"]).unwrap();
        let executed: Vec<_> = lines.iter().filter(|l| l.ends_with("for FAANG:")).collect();
        assert_eq!(executed.len(), 2);

        let lines = session(&ini, "16-05-2018", &["show", "faang"]).unwrap();
        assert!(lines.contains(&"  FB: 18".to_string()));
        assert!(lines.contains(&"  GOOG: 3".to_string()));
    }

    #[test]
    fn named_strategy_created_then_applied() {
        let (_dir, ini) = workspace();
        let lines = session(
            &ini,
            "12-05-2018",
            &[
                "create-strategy",
                "FAANG",
                "--equal",
                "FB,AAPL,NFLX,GOOG",
                "--amount",
                "5000",
                "--start",
                "05-05-2018",
                "--interval",
                "4",
            ],
        )
        .unwrap();
        assert_eq!(lines, vec!["created strategy FAANG"]);

        let lines = session(&ini, "12-05-2018", &["list"]).unwrap();
        assert!(lines.iter().any(|l| l.starts_with("  FAANG every 4 days from 05-05-2018")));

        session(&ini, "12-05-2018", &["apply-strategy", "FAANG", "retire"]).unwrap();
        let err =
            session(&ini, "12-05-2018", &["apply-strategy", "missing", "retire"]).unwrap_err();
        assert!(matches!(err, StocksimError::NotFound { .. }));

        let err = session(
            &ini,
            "12-05-2018",
            &["buy", "retire", "FB", "--amount", "1000", "--at", "11-05-2018 10:00"],
        )
        .unwrap_err();
        assert!(matches!(err, StocksimError::StrategyManaged { .. }));
    }

    #[test]
    fn broken_price_file_does_not_block_other_commands() {
        let (dir, ini) = workspace();
        session(&ini, "08-05-2018", &DCA_FAANG).unwrap();

        let aapl = dir.path().join("prices").join("AAPL.csv");
        fs::write(&aapl, "date,close\nnot-a-date,1.0\n").unwrap();

        let lines = session(&ini, "16-05-2018", &["list"]).unwrap();
        assert!(lines
            .iter()
            .any(|l| l.starts_with("dollar-cost averaging for FAANG stopped on 11-05-2018")));
        assert!(lines.contains(&"Portfolios:".to_string()));

        let lines = session(&ini, "16-05-2018", &["create-portfolio", "other"]).unwrap();
        assert_eq!(lines.last().map(String::as_str), Some("created portfolio OTHER"));

        let err = session(&ini, "16-05-2018", &["resume"]).unwrap_err();
        assert!(matches!(err, StocksimError::PriceSource { .. }));

        write_prices(&dir.path().join("prices"), "AAPL", 165.0);
        let lines = session(&ini, "16-05-2018", &["resume"]).unwrap();
        let executed: Vec<_> = lines.iter().filter(|l| l.ends_with("for FAANG:")).collect();
        assert_eq!(executed.len(), 2);

        let lines = session(&ini, "16-05-2018", &["show", "faang"]).unwrap();
        assert!(lines.contains(&"  FB: 18".to_string()));
        assert!(lines.contains(&"  AAPL: 21".to_string()));
    }
}
