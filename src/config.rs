//! Configuration management for EVN Monitor
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::accounts::{AccountRepository, parse_accounts};
use crate::billing::DEFAULT_MAX_PERIODS;
use crate::error::{EvnError, Result};
use crate::logging::parse_log_level;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one `<account>.json` data file per EVN customer
    pub data_dir: String,

    /// Billing cycle file; relative paths resolve against `data_dir`
    pub billing_cycles_file: String,

    /// Accounts list as stored by the integration options
    pub accounts_json: String,

    /// IANA timezone used to decide what "today" is
    pub timezone: String,

    /// Number of periods shown in the trend view
    pub trend_periods: usize,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    pub level: String,

    /// Optional console-specific log level; falls back to `level`
    pub console_level: Option<String>,

    /// Optional file-specific log level; falls back to `level`
    pub file_level: Option<String>,

    /// Path to log file
    pub file: String,

    /// Number of backup files to keep
    pub backup_count: u32,

    /// Whether to log to console
    #[serde(default = "default_true")]
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8099,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/evn-monitor.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "/config/nestup_evn".to_string(),
            billing_cycles_file: "evn_billing_cycles.json".to_string(),
            accounts_json: "[]".to_string(),
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            trend_periods: 3,
            web: WebConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "evn_monitor.yaml",
            "/data/evn_monitor.yaml",
            "/etc/evn-monitor/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(EvnError::validation("data_dir", "Cannot be empty"));
        }

        if self.billing_cycles_file.trim().is_empty() {
            return Err(EvnError::validation(
                "billing_cycles_file",
                "Cannot be empty",
            ));
        }

        if self.web.port == 0 {
            return Err(EvnError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if !(1..=DEFAULT_MAX_PERIODS).contains(&self.trend_periods) {
            return Err(EvnError::validation(
                "trend_periods",
                format!("Must be between 1 and {}", DEFAULT_MAX_PERIODS),
            ));
        }

        self.timezone()?;

        if parse_log_level(&self.logging.level).is_err() {
            return Err(EvnError::validation(
                "logging.level",
                format!("Unknown log level '{}'", self.logging.level),
            ));
        }

        Ok(())
    }

    /// Parsed timezone
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            EvnError::validation(
                "timezone",
                format!("Unknown timezone '{}'", self.timezone),
            )
        })
    }

    /// Current local date in the configured timezone
    pub fn today(&self) -> Result<NaiveDate> {
        let tz = self.timezone()?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }

    /// Location of the billing cycle file
    pub fn billing_cycles_path(&self) -> PathBuf {
        let file = Path::new(&self.billing_cycles_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            Path::new(&self.data_dir).join(file)
        }
    }

    /// Configured accounts; discovered from the data directory when none are listed
    pub fn accounts(&self) -> Result<Vec<String>> {
        let listed = parse_accounts(&self.accounts_json)?;
        if !listed.is_empty() {
            return Ok(listed);
        }
        let repository = AccountRepository::new(&self.data_dir);
        let cycles_path = self.billing_cycles_path();
        Ok(repository
            .discover()?
            .into_iter()
            .filter(|id| repository.path_for(id).ok().as_ref() != Some(&cycles_path))
            .collect())
    }
}
