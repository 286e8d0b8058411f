//! Configuration management for lotkeeper.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fee::{FeeSchedule, Money};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "lotkeeper";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "lotkeeper.db";

/// Default report directory name, inside the data directory.
const REPORT_DIR_NAME: &str = "reports";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `LOTKEEPER_`, sections split by `__`)
/// 2. TOML config file at `~/.config/lotkeeper/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Fee configuration.
    pub fees: FeesConfig,
    /// Lot rules.
    pub lot: LotConfig,
    /// Report output.
    pub report: ReportConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/lotkeeper/lotkeeper.db`
    pub database_path: Option<PathBuf>,
}

/// Pricing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeesConfig {
    /// Price of one started hour, in cents. Zones may override it.
    pub hourly_rate_cents: u64,
    /// Lowest amount charged for any stay, in cents.
    pub minimum_fee_cents: u64,
    /// Symbol printed before amounts.
    pub currency_symbol: String,
}

/// Lot rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotConfig {
    /// Optional pattern a normalized (uppercase) plate must match.
    /// Plates are free text when unset.
    pub plate_pattern: Option<String>,
}

/// Report output configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory reports are written to.
    /// Defaults to `~/.local/share/lotkeeper/reports`
    pub output_dir: Option<PathBuf>,
}

impl Default for FeesConfig {
    fn default() -> Self {
        let schedule = FeeSchedule::default();
        Self {
            hourly_rate_cents: schedule.hourly_rate.cents(),
            minimum_fee_cents: schedule.minimum_fee.cents(),
            currency_symbol: "$".to_string(),
        }
    }
}


impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("LOTKEEPER_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.fees.hourly_rate_cents == 0 {
            return Err(Error::ConfigValidation {
                message: "hourly_rate_cents must be greater than 0".to_string(),
            });
        }

        if self.fees.currency_symbol.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "currency_symbol must not be empty".to_string(),
            });
        }

        self.plate_regex()?;
        Ok(())
    }

    /// Compile the plate pattern, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regex.
    pub fn plate_regex(&self) -> Result<Option<Regex>> {
        self.lot
            .plate_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|_| Error::ConfigValidation {
                    message: format!("invalid regex pattern: {pattern}"),
                })
            })
            .transpose()
    }

    /// The default fee schedule.
    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(
            Money::from_cents(self.fees.hourly_rate_cents),
            Money::from_cents(self.fees.minimum_fee_cents),
        )
    }

    /// Format an amount with the configured currency symbol.
    #[must_use]
    pub fn format_money(&self, amount: Money) -> String {
        amount.with_symbol(&self.fees.currency_symbol)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the report directory, resolving defaults if not set.
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.report
            .output_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(REPORT_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.fees.hourly_rate_cents, 200);
        assert_eq!(config.fees.minimum_fee_cents, 200);
        assert_eq!(config.fees.currency_symbol, "$");
        assert!(config.storage.database_path.is_none());
        assert!(config.report.output_dir.is_none());
    }

    #[test]
    fn test_fee_schedule_from_config() {
        let mut config = Config::default();
        config.fees.hourly_rate_cents = 350;
        config.fees.minimum_fee_cents = 500;

        let schedule = config.fee_schedule();
        assert_eq!(schedule.hourly_rate, Money::from_cents(350));
        assert_eq!(schedule.minimum_fee, Money::from_cents(500));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_rate() {
        let mut config = Config::default();
        config.fees.hourly_rate_cents = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("hourly_rate_cents"));
    }

    #[test]
    fn test_validate_empty_currency_symbol() {
        let mut config = Config::default();
        config.fees.currency_symbol = " ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("currency_symbol"));
    }

    #[test]
    fn test_validate_invalid_regex() {
        let mut config = Config::default();
        config.lot.plate_pattern = Some("[invalid".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid regex"));
    }

    #[test]
    fn test_no_plate_pattern_by_default() {
        assert!(Config::default().lot.plate_pattern.is_none());
        assert!(Config::default().plate_regex().unwrap().is_none());
    }

    #[test]
    fn test_configured_plate_pattern() {
        let mut config = Config::default();
        config.lot.plate_pattern = Some(r"^[A-Z0-9][A-Z0-9 -]{0,11}$".to_string());

        let regex = config.plate_regex().unwrap().unwrap();
        assert!(regex.is_match("KA-01 AB"));
        assert!(!regex.is_match("-ABC"));
    }

    #[test]
    fn test_load_plate_pattern_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lot]\nplate_pattern = \"^[A-Z]+$\"\n").unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.lot.plate_pattern.as_deref(), Some("^[A-Z]+$"));
    }

    #[test]
    fn test_format_money() {
        let mut config = Config::default();
        assert_eq!(config.format_money(Money::from_cents(800)), "$8.00");
        config.fees.currency_symbol = "€".to_string();
        assert_eq!(config.format_money(Money::from_cents(250)), "€2.50");
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("lotkeeper.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_report_dir_default() {
        let path = Config::default().report_dir();
        assert!(path.ends_with("reports"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("lotkeeper"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[fees]\nhourly_rate_cents = 300\ncurrency_symbol = \"£\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.fees.hourly_rate_cents, 300);
        assert_eq!(config.fees.minimum_fee_cents, 200);
        assert_eq!(config.fees.currency_symbol, "£");
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fees]\nhourly_rate_cents = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_fees_config_deserialize() {
        let json = r#"{"hourly_rate_cents": 450}"#;
        let fees: FeesConfig = serde_json::from_str(json).unwrap();
        assert_eq!(fees.hourly_rate_cents, 450);
        assert_eq!(fees.minimum_fee_cents, 200);
    }
}
