/*!
 * Logging and tracing initialization
 */

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};

/// Resolve the effective level: verbose wins over the configured level
pub fn effective_level(config: &AgentConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Default filter directive covering the agent and the liveness core
pub fn default_directive(level: Level) -> String {
    format!("outage={},outage_core_liveness={}", level, level)
}

/// Where diagnostics are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Compact lines on stderr; stdout carries alerts
    Stderr,
    /// JSON lines appended to a file
    File(PathBuf),
}

impl LogTarget {
    pub fn from_config(config: &AgentConfig) -> Self {
        match config.log_file {
            Some(ref path) => LogTarget::File(path.clone()),
            None => LogTarget::Stderr,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`
pub fn init_logging(config: &AgentConfig) -> Result<()> {
    let filter = build_filter(effective_level(config))?;
    let layer = output_layer(&LogTarget::from_config(config), filter)?;

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| AgentError::Config(format!("Logging already initialized: {}", e)))
}

/// `RUST_LOG` when set, otherwise the agent and core at `level`
fn build_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| AgentError::Config(format!("Failed to create log filter: {}", e)))
}

fn output_layer(target: &LogTarget, filter: EnvFilter) -> Result<BoxedLayer> {
    let layer = match target {
        LogTarget::Stderr => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .with_filter(filter)
            .boxed(),
        LogTarget::File(path) => {
            // Restarts keep the history of earlier runs
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AgentError::Config(format!("Failed to open log file {}: {}", path.display(), e))
                })?;

            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(filter)
                .boxed()
        }
    };
    Ok(layer)
}

/// Route test output through the libtest capture, once per process
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::OnceLock;
    static INIT: OnceLock<()> = OnceLock::new();

    INIT.get_or_init(|| {
        let filter = build_filter(Level::DEBUG).unwrap_or_else(|_| EnvFilter::new("debug"));
        let layer = fmt::layer()
            .with_test_writer()
            .with_target(false)
            .compact()
            .with_filter(filter);

        // Another test binary may already own the global subscriber
        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_verbose_overrides_log_level() {
        let config = AgentConfig {
            log_level: LogLevel::Error,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_configured_level_without_verbose() {
        let config = AgentConfig {
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        assert_eq!(effective_level(&config), Level::WARN);
    }

    #[test]
    fn test_default_directive_is_valid_filter() {
        let directive = default_directive(Level::INFO);
        assert_eq!(directive, "outage=INFO,outage_core_liveness=INFO");
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn test_log_target_follows_config() {
        assert_eq!(LogTarget::from_config(&AgentConfig::default()), LogTarget::Stderr);

        let config = AgentConfig {
            log_file: Some(PathBuf::from("/var/log/outage.json")),
            ..Default::default()
        };
        assert_eq!(
            LogTarget::from_config(&config),
            LogTarget::File(PathBuf::from("/var/log/outage.json"))
        );
    }

    #[test]
    fn test_file_target_appends_to_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outage.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let filter = EnvFilter::new("info");
        output_layer(&LogTarget::File(path.clone()), filter).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "earlier run\n");
    }

    #[test]
    fn test_file_target_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("outage.log");

        let result = output_layer(&LogTarget::File(path), EnvFilter::new("info"));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("test logging ready");
    }
}
