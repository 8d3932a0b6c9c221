//! # Environment Configuration
//!
//! Loaded from a TOML file, a TOML string, or `NORMCACHE_*` environment
//! variables. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! root_id = "client:root"
//! parser_recursion_limit = 500
//!
//! [log]
//! format = "json"
//! filter = "normcache=debug"
//! ```

use crate::error::EnvironmentError;
use normcache_core::{DEFAULT_RECURSION_LIMIT, ROOT_ID};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Overrides `root_id`.
pub const ENV_ROOT_ID: &str = "NORMCACHE_ROOT_ID";
/// Overrides `parser_recursion_limit`.
pub const ENV_RECURSION_LIMIT: &str = "NORMCACHE_PARSER_RECURSION_LIMIT";
/// Overrides `log.format` (`text` or `json`).
pub const ENV_LOG_FORMAT: &str = "NORMCACHE_LOG_FORMAT";
/// Overrides `log.filter`.
pub const ENV_LOG_FILTER: &str = "NORMCACHE_LOG";

// =============================================================================
// TYPES
// =============================================================================

/// Settings for an [`Environment`](crate::Environment).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Entity id of the query root record.
    pub root_id: String,
    /// Nesting limit handed to the GraphQL parser.
    pub parser_recursion_limit: usize,
    /// Logging setup used by [`init_tracing`](crate::telemetry::init_tracing).
    pub log: LogConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            root_id: ROOT_ID.to_owned(),
            parser_recursion_limit: DEFAULT_RECURSION_LIMIT,
            log: LogConfig::default(),
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Plain text or one JSON object per line.
    pub format: LogFormat,
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "normcache=info".to_owned(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(EnvironmentError::Config(format!(
                "unknown log format '{other}' (expected 'text' or 'json')"
            ))),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl EnvironmentConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, EnvironmentError> {
        let config: Self =
            toml::from_str(source).map_err(|e| EnvironmentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EnvironmentError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            EnvironmentError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults overridden by `NORMCACHE_*` environment variables.
    pub fn from_env() -> Result<Self, EnvironmentError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `ENV_*` variable names.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EnvironmentError> {
        if let Some(root_id) = lookup(ENV_ROOT_ID) {
            self.root_id = root_id;
        }
        if let Some(limit) = lookup(ENV_RECURSION_LIMIT) {
            self.parser_recursion_limit = limit.trim().parse().map_err(|_| {
                EnvironmentError::Config(format!(
                    "{ENV_RECURSION_LIMIT} must be a positive integer, got '{limit}'"
                ))
            })?;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.log.format = format.parse()?;
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            self.log.filter = filter;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), EnvironmentError> {
        if self.root_id.is_empty() {
            return Err(EnvironmentError::Config("root_id must not be empty".into()));
        }
        if self.parser_recursion_limit == 0 {
            return Err(EnvironmentError::Config(
                "parser_recursion_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
