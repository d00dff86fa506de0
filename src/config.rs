//! Context configuration.

use bindery_core::Version;
use bindery_dispatch::{DispatchConfig, TieBreak};

use crate::logging::LogConfig;

/// Options applied when a [`Context`](crate::Context) is created and sealed.
///
/// ```ignore
/// let config = ContextConfig::new()
///     .with_host_version(Version::new(3, 11, 0))
///     .with_tie_break(TieBreak::Strict)
///     .with_logging(LogConfig::default());
/// let ctx = Context::with_config(config)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    dispatch: DispatchConfig,
    host_version: Option<Version>,
    logging: Option<LogConfig>,
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow lossy numeric conversions during dispatch.
    pub fn with_narrowing(mut self, allow: bool) -> Self {
        self.dispatch = self.dispatch.with_narrowing(allow);
        self
    }

    /// Tie-break rule for equally ranked overloads.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.dispatch = self.dispatch.with_tie_break(tie_break);
        self
    }

    /// Version of the embedding host, checked against the minimum.
    pub fn with_host_version(mut self, version: Version) -> Self {
        self.host_version = Some(version);
        self
    }

    /// Install a log subscriber when the context is created.
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn dispatch(&self) -> DispatchConfig {
        self.dispatch
    }

    pub fn host_version(&self) -> Option<Version> {
        self.host_version
    }

    pub fn logging(&self) -> Option<&LogConfig> {
        self.logging.as_ref()
    }
}
