//! Structured logging and tracing for EVN Monitor
//!
//! Log lines carry `component` and `account` fields so one customer's
//! requests can be followed through the store, the repository and the web
//! layer. The billing and tariff computations never log.

use crate::config::LoggingConfig;
use crate::error::{EvnError, Result};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Once;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// Dropping the guard stops the file writer thread
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT_ONCE: Once = Once::new();
static INIT_ERROR: OnceCell<String> = OnceCell::new();

/// Initialize logging system based on configuration
///
/// Only the first call configures anything; later calls report the outcome
/// of that first call.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        if let Err(e) = install_subscriber(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    match INIT_ERROR.get() {
        Some(err) => Err(EvnError::config(err.clone())),
        None => Ok(()),
    }
}

fn install_subscriber(config: &LoggingConfig) -> Result<()> {
    let (console_level, file_level) = resolve_levels(config)?;
    let console_only = should_use_console_only();

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if console_only || config.console_output {
        layers.push(output_layer(std::io::stdout, config.json_format, console_level));
    }
    let filter_level = if console_only {
        console_level
    } else {
        let appender = rolling::Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix("evn-monitor")
            .filename_suffix("log")
            .max_log_files(config.backup_count.max(1) as usize)
            .build(log_directory(&config.file))
            .map_err(|e| EvnError::io(format!("Failed to create log file appender: {}", e)))?;
        let (writer, guard) = non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        layers.push(output_layer(writer, config.json_format, file_level));
        most_verbose(console_level, file_level)
    };

    let installed = tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(filter_level))
        .try_init();

    // Tests install their own subscriber first; keep using it
    if let Err(e) = installed {
        if console_only {
            return Ok(());
        }
        return Err(EvnError::config(e.to_string()));
    }

    if console_only {
        info!(?console_level, "Logging initialized (console only)");
    } else {
        info!(?console_level, ?file_level, file = %config.file, "Logging initialized");
    }
    Ok(())
}

fn output_layer<W>(writer: W, json: bool, level: Level) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    let filter = LevelFilter::from_level(level);
    if json {
        base.json().with_filter(filter).boxed()
    } else {
        base.with_filter(filter).boxed()
    }
}

/// Console and file levels; each falls back to the base `level`
fn resolve_levels(config: &LoggingConfig) -> Result<(Level, Level)> {
    let base = parse_log_level(&config.level)?;
    let pick = |specific: &Option<String>| {
        specific
            .as_deref()
            .and_then(|s| parse_log_level(s).ok())
            .unwrap_or(base)
    };
    Ok((pick(&config.console_level), pick(&config.file_level)))
}

/// Directory for the rolling files: the parent of `file` when it names a file
fn log_directory(file: &str) -> &Path {
    let path = Path::new(file);
    match path.parent() {
        Some(parent) if path.extension().is_some() => parent,
        _ => path,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("evn_monitor={},tower_http={}", level, level).into())
}

fn should_use_console_only() -> bool {
    cfg!(test) || std::env::var_os("EVN_MONITOR_DISABLE_FILE_LOG").is_some()
}

/// `tracing` orders levels so that more verbose is greater
fn most_verbose(a: Level, b: Level) -> Level {
    a.max(b)
}

/// Parse log level string to tracing Level
///
/// `WARNING` and `CRITICAL` are accepted for compatibility with Home
/// Assistant style settings.
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.trim().to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" => Ok(Level::ERROR),
        _ => Err(EvnError::config(format!("Invalid log level: {}", level_str))),
    }
}

/// Context attached to every line of a [`StructuredLogger`]
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Emitting module, e.g. "persistence", "accounts", "web"
    pub component: String,

    /// EVN customer id the message relates to
    pub account: Option<String>,

    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            account: None,
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn with_account(mut self, account: String) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

/// Logger that stamps its context onto each event
#[derive(Clone)]
pub struct StructuredLogger {
    context: LogContext,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::INFO, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::WARN, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::ERROR, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::TRACE, message);
    }

    fn emit(&self, level: Level, message: &str) {
        let component = self.context.component.as_str();
        let account = self.context.account.as_deref().unwrap_or("-");
        let extra = self.extra_fields();
        match level {
            Level::ERROR => error!(component, account, %extra, "{}", message),
            Level::WARN => warn!(component, account, %extra, "{}", message),
            Level::INFO => info!(component, account, %extra, "{}", message),
            Level::DEBUG => debug!(component, account, %extra, "{}", message),
            _ => trace!(component, account, %extra, "{}", message),
        }
    }

    /// `key=value` pairs of the extra fields, comma separated
    fn extra_fields(&self) -> String {
        self.context
            .extra_fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Create a logger for a specific component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Create a logger with full context
pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level(" info ").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("WARNING").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("CRITICAL").unwrap(), Level::ERROR);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_most_verbose() {
        assert_eq!(most_verbose(Level::INFO, Level::DEBUG), Level::DEBUG);
        assert_eq!(most_verbose(Level::WARN, Level::ERROR), Level::WARN);
    }

    #[test]
    fn test_resolve_levels_falls_back_to_base() {
        let config = LoggingConfig {
            level: "WARNING".to_string(),
            console_level: Some("debug".to_string()),
            file_level: Some("nonsense".to_string()),
            ..LoggingConfig::default()
        };
        assert_eq!(resolve_levels(&config).unwrap(), (Level::DEBUG, Level::WARN));
    }

    #[test]
    fn test_log_directory() {
        assert_eq!(log_directory("/var/log/evn-monitor.log"), Path::new("/var/log"));
        assert_eq!(log_directory("/var/log/evn"), Path::new("/var/log/evn"));
    }

    #[test]
    fn test_log_context() {
        let context = LogContext::new("test")
            .with_account("PE0500123456".to_string())
            .with_field("key", "value".to_string());

        assert_eq!(context.component, "test");
        assert_eq!(context.account, Some("PE0500123456".to_string()));
        assert_eq!(context.extra_fields.get("key"), Some(&"value".to_string()));
    }

    #[test]
    fn test_structured_logger() {
        init_logging(&LoggingConfig::default()).unwrap();

        let logger = get_logger_with_context(
            LogContext::new("test_component")
                .with_field("b", "2".to_string())
                .with_field("a", "1".to_string()),
        );
        logger.info("Test info message");
        logger.debug("Test debug message");
        logger.warn("Test warning message");
        logger.error("Test error message");
        logger.trace("Test trace message");
        assert_eq!(logger.extra_fields(), "a=1,b=2");
    }
}
