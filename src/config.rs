/*!
 * Configuration types for the outage agent
 */

use outage_core_liveness::{LivenessConfig, DEFAULT_TTL_SEC};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

/// Main configuration for the outage agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// TTL given to newly tracked assets, in seconds.
    /// An asset is reported dead after twice this value without metrics.
    #[serde(default = "default_ttl_sec")]
    pub default_ttl_sec: u64,

    /// How often the dead-set sweep runs, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Severity attached to outage alerts
    #[serde(default = "default_severity")]
    pub alert_severity: String,

    /// Bus messages source (None = stdin)
    #[serde(default)]
    pub input: Option<PathBuf>,

    /// Alert destination (None = stdout)
    #[serde(default)]
    pub alerts_output: Option<PathBuf>,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug, also
    /// turns on per-asset cache tracing)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_ttl_sec: default_ttl_sec(),
            sweep_interval_secs: default_sweep_interval(),
            alert_severity: default_severity(),
            input: None,
            alerts_output: None,
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_ttl_sec() -> u64 {
    DEFAULT_TTL_SEC
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_severity() -> String {
    "CRITICAL".to_string()
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            return Err(AgentError::Config(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.alert_severity.trim().is_empty() {
            return Err(AgentError::Config("alert_severity must not be empty".to_string()));
        }

        Ok(())
    }

    /// Settings handed to the liveness cache
    pub fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            default_ttl_sec: self.default_ttl_sec,
            verbose: self.verbose,
        }
    }
}
