//! Structured logging via `tracing`.
//!
//! One subscriber per process: a stderr layer in the chosen format plus an
//! optional append-mode file layer. `RUST_LOG` overrides the configured level.
//!
//! Pipeline code logs through the `log_*` helpers so progress messages share
//! one shape whether they end up on a terminal or in the log file.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::error::{ConfigError, ConfigResult};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field human-readable lines.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON lines for machine parsing.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Append-mode log file, in addition to stderr.
    pub log_file: Option<PathBuf>,
    pub with_ansi: bool,
    /// Include the module path in each line.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            log_file: None,
            with_ansi: true,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// Parse a level name such as `info` or `DEBUG`.
    pub fn parse_level(level: &str) -> ConfigResult<Level> {
        Level::from_str(level.trim()).map_err(|_| ConfigError::InvalidValue {
            key: "log_level".to_string(),
            message: format!("'{}' is not one of error, warn, info, debug, trace", level),
        })
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    /// Filter from `RUST_LOG`, else the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> ConfigResult<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target);
    layers.push(match config.format {
        LogFormat::Pretty => stderr.boxed(),
        LogFormat::Compact => stderr.compact().boxed(),
        LogFormat::Json => stderr.json().boxed(),
    });

    if let Some(path) = &config.log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Logging(format!("{}: {}", parent.display(), e)))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ConfigError::Logging(format!("{}: {}", path.display(), e)))?;

        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true);
        layers.push(match config.format {
            LogFormat::Json => file_layer.json().boxed(),
            _ => file_layer.boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(config.env_filter())
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}

// =============================================================================
// Progress helpers
// =============================================================================

pub fn log_info(msg: impl AsRef<str>) {
    tracing::info!("{}", msg.as_ref());
}

pub fn log_success(msg: impl AsRef<str>) {
    tracing::info!(outcome = "success", "{}", msg.as_ref());
}

pub fn log_warning(msg: impl AsRef<str>) {
    tracing::warn!("{}", msg.as_ref());
}

pub fn log_error(msg: impl AsRef<str>) {
    tracing::error!("{}", msg.as_ref());
}
