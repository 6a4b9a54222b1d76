//! Logging configuration and initialization
//!
//! Centralized `tracing` setup for all Harvest components. Supports console
//! and/or daily-rotated file output, text or JSON formats, and environment
//! based overrides. Components log with the structured macros only; the
//! record output stream of the CLI is the one place plain stdout is used.
//!
//! # Example
//!
//! ```no_run
//! use harvest_common::logging::{init_logging, LogConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = LogConfig::from_env()?;
//! init_logging(&config)?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Output target for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl std::str::FromStr for LogOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(anyhow::anyhow!("Invalid log output: {}", s)),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,

    /// Output target (console, file, or both)
    pub output: LogOutput,

    /// Log format (text or JSON)
    pub format: LogFormat,

    /// Directory for log files (only used when output includes file)
    pub log_dir: PathBuf,

    /// Log file name prefix (e.g., "harvest" -> "harvest.2026-08-28.log")
    pub log_file_prefix: String,

    /// Additional filter directives (e.g., "reqwest=warn,hyper=warn")
    pub filter_directives: Option<String>,

    /// Whether to include target module names in logs
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "harvest".to_string(),
            filter_directives: None,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// Recognized variables: `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`,
    /// `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            config.output = output.parse()?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            config.log_file_prefix = prefix;
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        Ok(config)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_targets(mut self, include: bool) -> Self {
        self.config.include_targets = include;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at application startup.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',') {
            filter = filter.add_directive(
                directive
                    .parse()
                    .context("Failed to parse filter directive")?,
            );
        }
    }

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if matches!(config.output, LogOutput::Console | LogOutput::Both) {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_targets);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        // The guard must outlive the program for buffered lines to flush.
        std::mem::forget(guard);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(config.include_targets)
            .with_ansi(false);
        layers.push(match config.format {
            LogFormat::Text => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    // The boxed layers are typed against the bare registry, so they go on
    // first; the filter wraps whatever stack it is layered onto.
    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_output_from_str() {
        assert_eq!("stdout".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("file".parse::<LogOutput>().unwrap(), LogOutput::File);
        assert_eq!("all".parse::<LogOutput>().unwrap(), LogOutput::Both);
        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_init_logging_with_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Both)
            .format(LogFormat::Json)
            .log_dir(&log_dir)
            .log_file_prefix("harvest-test")
            .filter_directives("hyper=warn")
            .build();

        // The global subscriber can only be installed once per process, so
        // this is the single test that initializes it.
        init_logging(&config).unwrap();
        tracing::info!(check = true, "logging initialized");

        assert!(log_dir.is_dir());
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::File)
            .format(LogFormat::Json)
            .log_dir("/var/log/harvest")
            .log_file_prefix("extract")
            .build();

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/harvest"));
        assert_eq!(config.log_file_prefix, "extract");
    }
}
