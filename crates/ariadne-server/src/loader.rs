//! Layered configuration loading.
//!
//! Layers apply in order, later ones overriding earlier ones:
//!
//! 1. Defaults
//! 2. A TOML or JSON document (file or string)
//! 3. Environment variables `{PREFIX}__{SECTION}__{KEY}`
//!
//! | Variable                                 | Field                        |
//! |------------------------------------------|------------------------------|
//! | `ARIADNE__BASE_PATH`                     | `base_path`                  |
//! | `ARIADNE__EXECUTORS__REQUESTING`         | `executors.requesting`       |
//! | `ARIADNE__EXECUTORS__RESPONDING`         | `executors.responding`       |
//! | `ARIADNE__EXECUTORS__THREAD_NAME`        | `executors.thread_name`      |
//! | `ARIADNE__CHUNKED__POLL_INTERVAL_MS`     | `chunked.poll_interval_ms`   |
//! | `ARIADNE__CHUNKED__CAPACITY`             | `chunked.capacity`           |
//! | `ARIADNE__LOGGING__ENABLED`              | `logging.enabled`            |
//! | `ARIADNE__LOGGING__LEVEL`                | `logging.level`              |
//! | `ARIADNE__LOGGING__FORMAT`               | `logging.format`             |
//!
//! Executor values are `direct`, `pooled` or `pooled:<size>`.

use std::env;
use std::fs;
use std::path::Path;

use ariadne_telemetry::LogFormat;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{ConfigError, ConfigResult};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "ARIADNE";

/// Builds a [`ServerConfig`] from layered sources.
///
/// # Example
///
/// ```
/// use ariadne_server::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_string("base_path = \"/api\"", "toml")
///     .unwrap()
///     .with_env_vars([("ARIADNE__CHUNKED__CAPACITY", "32")])
///     .load()
///     .unwrap();
///
/// assert_eq!(config.base_path.as_deref(), Some("/api"));
/// assert_eq!(config.chunked.capacity, Some(32));
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: ServerConfig,
    env_prefix: Option<String>,
    overrides: Vec<(String, String)>,
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a TOML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, has an unsupported
    /// extension or does not parse.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        self.config = parse(&content, format)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be loaded.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the given format (`toml` or
    /// `json`).
    ///
    /// # Errors
    ///
    /// Fails on an unsupported format or a parse error.
    pub fn with_string(mut self, content: &str, format: &str) -> ConfigResult<Self> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Reads overrides from process environment variables with `prefix`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Adds explicit `{PREFIX}__...` overrides, applied after the process
    /// environment.
    #[must_use]
    pub fn with_env_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Applies overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable override or an invalid final configuration.
    pub fn load(self) -> ConfigResult<ServerConfig> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides without validating.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable override.
    pub fn load_unvalidated(mut self) -> ConfigResult<ServerConfig> {
        let prefix = self
            .env_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_string());

        let mut vars: Vec<(String, String)> = match &self.env_prefix {
            Some(p) => {
                let scoped = format!("{p}__");
                env::vars().filter(|(k, _)| k.starts_with(&scoped)).collect()
            }
            None => Vec::new(),
        };
        vars.sort();
        vars.append(&mut self.overrides);

        for (key, value) in vars {
            apply_env_var(&mut self.config, &key, &value, &prefix)?;
        }

        Ok(self.config)
    }
}

fn parse(content: &str, format: &str) -> ConfigResult<ServerConfig> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat {
            format: other.to_string(),
        }),
    }
}

fn apply_env_var(
    config: &mut ServerConfig,
    key: &str,
    value: &str,
    prefix: &str,
) -> ConfigResult<()> {
    let path = key
        .strip_prefix(prefix)
        .and_then(|k| k.strip_prefix("__"))
        .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
    let parts: Vec<&str> = path.split("__").collect();

    match parts.as_slice() {
        ["BASE_PATH"] => {
            config.base_path = Some(value.to_string()).filter(|v| !v.is_empty());
        }
        ["EXECUTORS", "REQUESTING"] => {
            config.executors.requesting = value
                .parse()
                .map_err(|reason: String| ConfigError::env_parse_error(key, reason))?;
        }
        ["EXECUTORS", "RESPONDING"] => {
            config.executors.responding = value
                .parse()
                .map_err(|reason: String| ConfigError::env_parse_error(key, reason))?;
        }
        ["EXECUTORS", "THREAD_NAME"] => {
            config.executors.thread_name = value.to_string();
        }
        ["CHUNKED", "POLL_INTERVAL_MS"] => {
            config.chunked.poll_interval_ms = value
                .parse()
                .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
        }
        ["CHUNKED", "CAPACITY"] => {
            config.chunked.capacity = if value.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(value.parse().map_err(|_| {
                    ConfigError::env_parse_error(key, "expected integer or 'none'")
                })?)
            };
        }
        ["LOGGING", "ENABLED"] => {
            config.logging.enabled = parse_bool(value)
                .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
        }
        ["LOGGING", "LEVEL"] => {
            config.logging.level = value.to_string();
        }
        ["LOGGING", "FORMAT"] => {
            config.logging.format = match value.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                "compact" => LogFormat::Compact,
                _ => {
                    return Err(ConfigError::env_parse_error(
                        key,
                        "expected 'json', 'pretty' or 'compact'",
                    ))
                }
            };
        }
        _ => {
            debug!(var = key, "Ignoring unknown configuration variable");
        }
    }

    Ok(())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
