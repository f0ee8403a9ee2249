//! Layered configuration.
//!
//! Values come from an optional TOML file overlaid by `ODIN__`-prefixed
//! environment variables, e.g. `ODIN__BACKEND__BASE_URL`.

use crate::error::CliError;
use config::{Config, Environment, File, FileFormat};
use odin_ai::LlmBackendConfig;
use odin_conversation::Level;
use odin_core::Result;
use serde::Deserialize;
use std::path::Path;

/// File read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "odin.toml";

/// Variable consulted when no API key is configured.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OdinConfig {
    /// Inference backend settings.
    #[serde(default)]
    pub backend: LlmBackendConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// Diagnostic filter used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Append run events to the thread's `log_file`.
    #[serde(default = "default_thread_log")]
    pub thread_log: bool,

    /// Least severe run event recorded.
    #[serde(default)]
    pub min_level: Level,
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_thread_log() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            thread_log: default_thread_log(),
            min_level: Level::default(),
        }
    }
}

impl OdinConfig {
    /// Loads configuration from `path` (or `odin.toml`) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, or if any
    /// source holds invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        Self::from_sources(
            path,
            environment(),
            std::env::var(API_KEY_VAR).ok(),
        )
        .map_err(|e| {
            CliError::Config {
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn from_sources(
        path: Option<&Path>,
        environment: Environment,
        fallback_api_key: Option<String>,
    ) -> std::result::Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let mut config: Self = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        if config.backend.api_key.is_none() {
            config.backend.api_key = fallback_api_key.filter(|key| !key.is_empty());
        }
        Ok(config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("ODIN")
        .separator("__")
        .try_parsing(true)
}
