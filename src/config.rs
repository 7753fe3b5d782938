//! Configuration management for cmdrun.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Args;
use crate::execution::{CommandOptions, DEFAULT_TIMEOUT};
use crate::launcher::Shell;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied to every command.
    pub defaults: DefaultsSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Command defaults section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    /// Timeout in milliseconds. `None` or `0` disables the timeout.
    pub timeout_ms: Option<u64>,
    /// Interpreter and its flags, e.g. `"/bin/bash -c"`.
    pub shell: Option<String>,
    /// Layer explicit variables over the caller's environment.
    pub inherit_env: bool,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
    /// `KEY=VALUE` entries added to every command.
    pub env: Vec<String>,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            timeout_ms: Some(DEFAULT_TIMEOUT.as_millis() as u64),
            shell: None,
            inherit_env: true,
            working_dir: None,
            env: Vec::new(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    fn apply_env_from<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = var("CMDRUN_TIMEOUT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CMDRUN_TIMEOUT_MS", ms))?;
            self.defaults.timeout_ms = Some(ms);
        }

        if let Some(shell) = var("CMDRUN_SHELL") {
            self.defaults.shell = Some(shell);
        }

        if let Some(inherit) = var("CMDRUN_INHERIT_ENV") {
            self.defaults.inherit_env = parse_bool(&inherit)
                .ok_or(ConfigError::InvalidValue("CMDRUN_INHERIT_ENV", inherit))?;
        }

        if let Some(level) = var("CMDRUN_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ms) = args.timeout_ms {
            self.defaults.timeout_ms = Some(ms);
        }
        if args.no_timeout {
            self.defaults.timeout_ms = None;
        }

        if let Some(ref dir) = args.dir {
            self.defaults.working_dir = Some(dir.clone());
        }

        self.defaults.env.extend(args.env.iter().cloned());

        if let Some(inherit) = args.inherit_env {
            self.defaults.inherit_env = inherit;
        }

        if let Some(ref shell) = args.shell {
            self.defaults.shell = Some(shell.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Config::default();

        // Load from config file if specified
        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        // Apply environment variable overrides
        config.apply_env()?;

        // Apply CLI argument overrides (highest priority)
        config.apply_args(args);

        Ok(config)
    }

    /// Effective timeout; `None` means wait forever.
    pub fn timeout(&self) -> Option<Duration> {
        self.defaults
            .timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Convert to options for a [`Command`](crate::Command).
    pub fn to_options(&self) -> Result<CommandOptions, ConfigError> {
        let shell = match self.defaults.shell.as_deref() {
            Some(spec) => Some(
                Shell::parse(spec).ok_or_else(|| ConfigError::InvalidShell(spec.to_string()))?,
            ),
            None => None,
        };

        Ok(CommandOptions {
            working_dir: self.defaults.working_dir.clone(),
            timeout: self.timeout(),
            env: self.defaults.env.clone(),
            inherit_env: self.defaults.inherit_env,
            shell,
            ..CommandOptions::default()
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[source] serde_json::Error),
    /// Unparseable environment override.
    #[error("invalid value for {0}: '{1}'")]
    InvalidValue(&'static str, String),
    /// Empty interpreter spec.
    #[error("invalid shell: '{0}'")]
    InvalidShell(String),
}
