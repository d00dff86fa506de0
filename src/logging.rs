//! Structured logging setup.
//!
//! The binding crates emit `tracing` events: registration at `debug`,
//! dispatch decisions at `trace`, lifetime transitions at `debug` and
//! lifetime violations at `warn`. Nothing is printed until a subscriber is
//! installed, either by the host or with [`init_logging`].
//!
//! The filter comes from [`LogConfig::directives`] when set, otherwise from
//! the `BINDERY_LOG` environment variable, otherwise from
//! [`LogConfig::level`].

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, ParseError};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Environment variable read for filter directives.
pub const LOG_ENV: &str = "BINDERY_LOG";

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level used when neither directives nor `BINDERY_LOG` are set.
    pub level: Level,
    /// Explicit filter directives, e.g. `bindery_dispatch=trace`.
    pub directives: Option<String>,
    /// Print event targets.
    pub with_target: bool,
    /// Print thread ids.
    pub with_thread_ids: bool,
    /// Colored output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            directives: None,
            with_target: true,
            with_thread_ids: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Verbose configuration for debugging binding problems.
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            with_thread_ids: true,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Build the filter this configuration describes.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Some(directives) = &self.directives {
            return Ok(EnvFilter::try_new(directives)?);
        }
        Ok(EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .with_env_var(LOG_ENV)
            .from_env_lossy())
    }
}

/// Logging setup failures.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Install a global fmt subscriber.
///
/// Fails if another global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = config.filter()?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids)
                .with_ansi(config.ansi),
        )
        .try_init()?;
    Ok(())
}
