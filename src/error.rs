/*!
 * Error types for the outage agent
 */

use outage_core_liveness::LivenessError;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RUNTIME: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration file
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A bus message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The liveness cache rejected an operation
    #[error("Liveness cache error: {0}")]
    Liveness(#[from] LivenessError),

    /// An alert could not be published
    #[error("Alert publishing failed: {0}")]
    Alert(String),
}

impl AgentError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::Config(_) | AgentError::Toml(_) | AgentError::TomlSerialize(_) => {
                EXIT_FATAL
            }
            AgentError::Liveness(_) => EXIT_FATAL,
            AgentError::Io(_) | AgentError::Decode(_) | AgentError::Alert(_) => EXIT_RUNTIME,
        }
    }

    /// Check if the agent can keep processing after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AgentError::Decode(_))
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AgentError::Config("x".into()).exit_code(), EXIT_FATAL);
        assert_eq!(AgentError::Decode("x".into()).exit_code(), EXIT_RUNTIME);
        assert_eq!(
            AgentError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "closed")).exit_code(),
            EXIT_RUNTIME
        );
        assert_eq!(
            AgentError::Liveness(LivenessError::Allocation {
                requested: 1,
                reason: "oom".into()
            })
            .exit_code(),
            EXIT_FATAL
        );
    }

    #[test]
    fn test_only_decode_errors_are_recoverable() {
        assert!(AgentError::Decode("bad json".into()).is_recoverable());
        assert!(!AgentError::Alert("sink closed".into()).is_recoverable());
        assert!(!AgentError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err: AgentError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AgentError::Decode(_)));
        assert!(err.to_string().starts_with("Decode error"));
    }
}
