//! Core error types for paceline-core.
//!
//! Errors are split along the retryability boundary: [`InvariantError`]
//! variants indicate a data-integrity or programming defect and must not be
//! retried without a fix, while collaborator failures ([`CoreError::Store`],
//! [`CoreError::Delivery`]) are transient and safe to retry a bounded number
//! of times. Schedule-placement problems are not errors at all; see
//! `validator::ValidationReport`.

use std::path::PathBuf;
use thiserror::Error;

use crate::profile::DayOfWeek;

/// Core error type for paceline-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Data-integrity violations. Non-retryable.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    /// Schedule store collaborator failure. Retryable.
    #[error("Store error: {0}")]
    Store(String),

    /// Notification delivery collaborator failure. Retryable.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Exclusivity lease for the accountability loop is held elsewhere.
    #[error("Lease '{key}' is already held")]
    LeaseHeld { key: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    /// Whether a bounded retry of the failing step is permitted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Store(_) | CoreError::Delivery(_))
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Data-integrity violations.
///
/// These indicate a defect in the stored data or the calling code, not a
/// transient condition; the current step must fail with full context.
#[derive(Error, Debug)]
pub enum InvariantError {
    /// The weekday routine has no sleep span, so wake/sleep cannot be resolved.
    #[error("No sleep span in routine of user '{user_id}' for {day}")]
    MissingSleepSpan { user_id: String, day: DayOfWeek },

    /// An event is linked to a goal that has no notification settings.
    #[error("No notification settings for goal '{goal_id}'")]
    MissingSettings { goal_id: String },

    /// An event references a goal that does not exist in the loaded snapshot.
    #[error("Event '{event_id}' references unknown goal '{goal_id}'")]
    UnknownGoal { event_id: String, goal_id: String },

    /// A time range with end before (or equal to) start.
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
