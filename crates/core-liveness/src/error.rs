//! Error types for the liveness cache

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LivenessError {
    /// The entry map could not grow to hold the requested number of assets
    #[error("Failed to reserve room for {requested} asset(s): {reason}")]
    Allocation { requested: usize, reason: String },
}

impl LivenessError {
    pub(crate) fn allocation(requested: usize, err: TryReserveError) -> Self {
        LivenessError::Allocation {
            requested,
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LivenessError>;
