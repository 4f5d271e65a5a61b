//! Server configuration.
//!
//! [`ServerConfig`] is plain data: it can be built in code with
//! [`ServerConfig::builder`] or deserialized from TOML/JSON through
//! [`ConfigLoader`](crate::ConfigLoader). Every section has defaults, so an
//! empty document is a valid configuration.
//!
//! ```toml
//! base_path = "/api"
//!
//! [executors]
//! thread_name = "ariadne-worker"
//! requesting = { kind = "pooled", size = 8 }
//! responding = { kind = "direct" }
//!
//! [chunked]
//! poll_interval_ms = 5000
//! capacity = 64
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ariadne_core::ChunkedConfig;
use ariadne_telemetry::{LogConfig, TelemetryResult};
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Default prefix for executor worker thread names.
pub const DEFAULT_THREAD_NAME: &str = "ariadne-worker";

/// Default chunk poll interval in milliseconds.
pub const DEFAULT_CHUNK_POLL_INTERVAL_MS: u64 = 5_000;

/// How an executor runs the work submitted to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum ExecutorKind {
    /// Runs work inline on the calling task.
    Direct,
    /// Runs work on a dedicated pool of worker threads.
    Pooled {
        /// Number of worker threads.
        size: usize,
    },
}

impl ExecutorKind {
    /// A pool sized to the machine's available parallelism.
    #[must_use]
    pub fn pooled_default() -> Self {
        let size = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::Pooled { size }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Pooled { size } => write!(f, "pooled:{size}"),
        }
    }
}

/// Parses `direct`, `pooled` (sized to available parallelism) or
/// `pooled:<size>`.
impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.split_once(':') {
            None if lower == "direct" => Ok(Self::Direct),
            None if lower == "pooled" => Ok(Self::pooled_default()),
            Some(("pooled", size)) => size
                .trim()
                .parse()
                .map(|size| Self::Pooled { size })
                .map_err(|_| format!("invalid pool size '{size}'")),
            _ => Err(format!("expected 'direct', 'pooled' or 'pooled:<size>', got '{s}'")),
        }
    }
}

/// Executor section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Executor running resource methods. Defaults to a pool sized to the
    /// available parallelism so handlers never run on the caller's task.
    pub requesting: ExecutorKind,

    /// Executor writing responses. Defaults to direct.
    pub responding: ExecutorKind,

    /// Prefix for pooled worker thread names.
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            requesting: ExecutorKind::pooled_default(),
            responding: ExecutorKind::Direct,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Chunked response section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkedSettings {
    /// How long a consumer waits for the next chunk, in milliseconds.
    pub poll_interval_ms: u64,

    /// Queue bound; unbounded when absent.
    pub capacity: Option<usize>,
}

impl Default for ChunkedSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_CHUNK_POLL_INTERVAL_MS,
            capacity: None,
        }
    }
}

impl ChunkedSettings {
    /// Converts the settings into a buffer configuration.
    #[must_use]
    pub fn to_chunked_config(&self) -> ChunkedConfig {
        let config =
            ChunkedConfig::new().poll_interval(Duration::from_millis(self.poll_interval_ms));
        match self.capacity {
            Some(capacity) => config.capacity(capacity),
            None => config,
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Path prefix under which all resources are mounted, e.g. `/api`.
    pub base_path: Option<String>,

    /// Executor settings.
    pub executors: ExecutorConfig,

    /// Chunked response settings.
    pub chunked: ChunkedSettings,

    /// Logging settings.
    pub logging: LogConfig,
}

impl ServerConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the base path normalized to `/segment[/segment...]`, or
    /// `None` when no prefix applies.
    pub fn normalized_base_path(&self) -> Option<String> {
        let trimmed = self.base_path.as_deref()?.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{trimmed}"))
        }
    }

    /// Returns the buffer configuration for chunked responses.
    #[must_use]
    pub fn chunked_config(&self) -> ChunkedConfig {
        self.chunked.to_chunked_config()
    }

    /// Installs the global log subscriber described by the `logging`
    /// section.
    ///
    /// # Errors
    ///
    /// Fails on an invalid filter directive or when a subscriber is already
    /// installed.
    pub fn init_logging(&self) -> TelemetryResult<()> {
        ariadne_telemetry::init_logging(&self.logging)
    }

    /// Checks the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, kind) in [
            ("executors.requesting.size", self.executors.requesting),
            ("executors.responding.size", self.executors.responding),
        ] {
            if kind == (ExecutorKind::Pooled { size: 0 }) {
                return Err(ConfigError::invalid_value(field, "pool size must be positive"));
            }
        }

        if self.executors.thread_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "executors.thread_name",
                "must not be empty",
            ));
        }

        if self.chunked.poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "chunked.poll_interval_ms",
                "must be positive",
            ));
        }

        if self.chunked.capacity == Some(0) {
            return Err(ConfigError::invalid_value(
                "chunked.capacity",
                "must be positive when set",
            ));
        }

        if let Some(base) = &self.base_path {
            if base.contains(['{', '}', '*']) {
                return Err(ConfigError::invalid_value(
                    "base_path",
                    format!("must be a literal path, got '{base}'"),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Sets the base path.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.base_path = Some(base_path.into());
        self
    }

    /// Sets the requesting executor.
    pub const fn requesting_executor(mut self, kind: ExecutorKind) -> Self {
        self.config.executors.requesting = kind;
        self
    }

    /// Sets the responding executor.
    pub const fn responding_executor(mut self, kind: ExecutorKind) -> Self {
        self.config.executors.responding = kind;
        self
    }

    /// Sets the worker thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.executors.thread_name = name.into();
        self
    }

    /// Sets the chunk poll interval.
    pub fn chunk_poll_interval(mut self, interval: Duration) -> Self {
        self.config.chunked.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bounds chunked response queues.
    pub const fn chunk_capacity(mut self, capacity: usize) -> Self {
        self.config.chunked.capacity = Some(capacity);
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Builds the configuration without validating it.
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
