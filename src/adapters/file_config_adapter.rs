//! INI file configuration adapter.
//!
//! ```ini
//! [prices]
//! directory = ./prices
//! lookback_days = 10
//!
//! [store]
//! path = ./stocksim.db
//!
//! [trading]
//! commission = 4.95
//! strict_strategy_portfolios = true
//! ```

use crate::domain::error::StocksimError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StocksimError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| StocksimError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, StocksimError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| StocksimError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    /// Blank values count as missing.
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const FULL: &str = r#"
[prices]
directory = /data/prices
lookback_days = 5

[store]
path = /data/stocksim.db
pool_size = 2

[trading]
commission = 4.95
strict_strategy_portfolios = no
"#;

    #[test]
    fn from_string_reads_all_sections() {
        let adapter = FileConfigAdapter::from_string(FULL).unwrap();
        assert_eq!(
            adapter.get_string("prices", "directory"),
            Some("/data/prices".to_string())
        );
        assert_eq!(adapter.get_int("prices", "lookback_days", 10), 5);
        assert_eq!(
            adapter.get_string("store", "path"),
            Some("/data/stocksim.db".to_string())
        );
        assert_eq!(adapter.get_int("store", "pool_size", 4), 2);
        assert_eq!(adapter.get_double("trading", "commission", 0.0), 4.95);
        assert!(!adapter.get_bool("trading", "strict_strategy_portfolios", true));
    }

    #[test]
    fn missing_and_blank_strings_are_none() {
        let adapter = FileConfigAdapter::from_string("[store]\npath =\n").unwrap();
        assert_eq!(adapter.get_string("store", "path"), None);
        assert_eq!(adapter.get_string("store", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn numeric_defaults_for_missing_or_garbage() {
        let ini = "[trading]\ncommission = cheap\n[prices]\nlookback_days = x\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        assert_eq!(adapter.get_double("trading", "commission", 1.5), 1.5);
        assert_eq!(adapter.get_int("prices", "lookback_days", 10), 10);
        assert_eq!(adapter.get_int("store", "pool_size", 4), 4);
    }

    #[test]
    fn bool_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[trading]\na = true\nb = Yes\nc = 1\nd = off\ne = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("trading", "a", false));
        assert!(adapter.get_bool("trading", "b", false));
        assert!(adapter.get_bool("trading", "c", false));
        assert!(!adapter.get_bool("trading", "d", true));
        assert!(adapter.get_bool("trading", "e", true));
        assert!(!adapter.get_bool("trading", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[prices]\ndirectory = ./prices\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("prices", "directory"),
            Some("./prices".to_string())
        );
    }

    #[test]
    fn from_file_missing_file_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/stocksim.ini");
        assert!(matches!(result, Err(StocksimError::ConfigParse { .. })));
    }
}
