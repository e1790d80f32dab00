//! # Logger
//!
//! Centralized tracing setup for the CLI and embedding services: console
//! output, optional rolling file output with non-blocking I/O, and
//! environment-based filtering (`RUST_LOG` wins over the programmatic
//! default).
//!
//! ## Example
//!
//! ```rust
//! # use clic_logger::{LevelFilter, Logger};
//! let _logger = Logger::builder()
//!     .name("clic")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::LoggerError;
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

/// A builder for configuring and initializing the global tracing subscriber.
#[derive(Debug)]
pub struct LoggerBuilder {
    name: String,
    console: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    env_filter: Option<String>,
}

impl LoggerBuilder {
    /// Sets the logger name, used as the rolling-file prefix.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables console output.
    #[must_use]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Configures the minimum log level to be emitted.
    #[must_use]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Adds a programmatic filter default (e.g. `clic=debug,hickory=warn`);
    /// `RUST_LOG` still overrides.
    #[must_use]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables rolling file output under `path`.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Configures the rotation strategy for file output.
    #[must_use]
    pub const fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Configures how many rotated files to keep.
    #[must_use]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.max_files = max;
        self
    }

    /// Consumes the builder and installs the global subscriber.
    ///
    /// # Returns
    /// A [`Logger`] handle holding the non-blocking worker guard; keep it
    /// alive for the life of the program or file logs may be lost.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, a bad
    ///   filter expression, or no enabled output.
    /// * [`LoggerError::Subscriber`] when a global subscriber already exists.
    pub fn init(self) -> Result<Logger, LoggerError> {
        if self.name.trim().is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "logger name cannot be empty".to_owned(),
            });
        }
        if !self.console && self.path.is_none() {
            return Err(LoggerError::InvalidConfiguration {
                message: "no logging output enabled; enable console or file output".to_owned(),
            });
        }

        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()
            .map_err(|e| LoggerError::InvalidConfiguration { message: e.to_string() })?;
        if let Some(directives) = &self.env_filter {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                filter = filter.add_directive(directive.trim().parse().map_err(
                    |e: tracing_subscriber::filter::ParseError| LoggerError::InvalidConfiguration {
                        message: e.to_string(),
                    },
                )?);
            }
        }

        let mut layers = Vec::new();
        if self.console {
            layers.push(layer().compact().with_ansi(true).boxed());
        }

        let guard = match self.path {
            Some(path) => {
                fs::create_dir_all(&path).map_err(|e| LoggerError::InvalidConfiguration {
                    message: format!("cannot create log directory {}: {e}", path.display()),
                })?;

                let appender = RollingFileAppender::builder()
                    .rotation(self.rotation)
                    .filename_prefix(&self.name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(self.max_files)
                    .build(path)
                    .map_err(|e| LoggerError::InvalidConfiguration { message: e.to_string() })?;

                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                layers.push(layer().with_writer(non_blocking).with_ansi(false).boxed());
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(filter).with(layers).try_init().map_err(|e| {
            LoggerError::Subscriber { message: e.to_string() }
        })?;

        Ok(Logger { guard })
    }
}

/// A handle to the initialized logging system.
///
/// Holds the background worker guard; drop only at shutdown.
#[must_use = "Dropping this handle stops the background logging worker."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Returns a new [`LoggerBuilder`] with console output at `INFO`.
    #[must_use = "The builder must be configured before it can initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder {
            name: String::new(),
            console: true,
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            env_filter: None,
        }
    }

    /// Returns the worker guard, if file logging is active.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}
