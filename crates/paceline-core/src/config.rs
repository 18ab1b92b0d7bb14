//! TOML-based tuning configuration.
//!
//! Every empirically tuned constant of the engine lives here so product can
//! adjust behavior without a code change:
//! - Allocation decay and priority factors
//! - Free-interval minimum block size
//! - Accountability loop horizons and timeouts
//! - Delivery concurrency and retry bounds
//!
//! The factor values ship as found in production tuning; they have no
//! documented derivation and should not be altered without product sign-off.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::goal::GoalPriority;

/// Multipliers applied to a goal's outstanding amount by priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityFactors {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl PriorityFactors {
    /// Look up the factor for a priority tier.
    pub fn for_priority(&self, priority: GoalPriority) -> f64 {
        match priority {
            GoalPriority::High => self.high,
            GoalPriority::Medium => self.medium,
            GoalPriority::Low => self.low,
        }
    }
}

/// Allocation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Per-day discount applied to projected future free time.
    #[serde(default = "default_horizon_decay")]
    pub horizon_decay: f64,
    /// Steady-state factors for weekly-commitment goals.
    #[serde(default = "default_weekly_factors")]
    pub weekly_priority_factors: PriorityFactors,
    /// Steady-state factors for deadline goals.
    #[serde(default = "default_deadline_factors")]
    pub deadline_priority_factors: PriorityFactors,
    /// Steeper factors used when re-planning after falling behind.
    #[serde(default = "default_catch_up_factors")]
    pub catch_up_factors: PriorityFactors,
    /// Allocation results are rounded to this increment.
    #[serde(default = "default_rounding_minutes")]
    pub rounding_minutes: i64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            horizon_decay: default_horizon_decay(),
            weekly_priority_factors: default_weekly_factors(),
            deadline_priority_factors: default_deadline_factors(),
            catch_up_factors: default_catch_up_factors(),
            rounding_minutes: default_rounding_minutes(),
        }
    }
}

/// Free-interval computation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Free gaps shorter than this are dropped as unusable slivers.
    #[serde(default = "default_min_block_minutes")]
    pub min_block_minutes: i64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            min_block_minutes: default_min_block_minutes(),
        }
    }
}

/// Accountability loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How far back to load events on refresh, in minutes.
    /// An upper bound on any configured "after" offset.
    #[serde(default = "default_lookbehind_minutes")]
    pub lookbehind_minutes: i64,
    /// How far ahead to load events on refresh, in minutes.
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: i64,
    /// Maximum idle/await time before an unconditional refresh, in minutes.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: i64,
    /// A wake this far past the target is treated as clock drift and not fired.
    #[serde(default = "default_drift_tolerance_secs")]
    pub drift_tolerance_secs: i64,
    /// Exclusivity key guaranteeing one loop instance per environment.
    #[serde(default = "default_lease_key")]
    pub lease_key: String,
    /// Bounded retries for schedule-store calls.
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,
    /// Backoff between store retries, in milliseconds.
    #[serde(default = "default_store_retry_backoff_ms")]
    pub store_retry_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookbehind_minutes: default_lookbehind_minutes(),
            lookahead_minutes: default_lookahead_minutes(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            drift_tolerance_secs: default_drift_tolerance_secs(),
            lease_key: default_lease_key(),
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_backoff_ms: default_store_retry_backoff_ms(),
        }
    }
}

/// Notification delivery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Global cap on concurrently-serviced users (third-party rate limits).
    #[serde(default = "default_max_concurrent_users")]
    pub max_concurrent_users: usize,
    /// Delivery attempts per notification before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between delivery attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_users: default_max_concurrent_users(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Engine tuning configuration.
///
/// Serialized to/from TOML at a caller-supplied path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub intervals: IntervalConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl TuningConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Load configuration, falling back to defaults if the file is absent
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

// Default functions
fn default_horizon_decay() -> f64 {
    0.925
}
fn default_weekly_factors() -> PriorityFactors {
    PriorityFactors {
        high: 1.0,
        medium: 0.985,
        low: 0.95,
    }
}
fn default_deadline_factors() -> PriorityFactors {
    PriorityFactors {
        high: 1.0,
        medium: 0.97,
        low: 0.90,
    }
}
fn default_catch_up_factors() -> PriorityFactors {
    PriorityFactors {
        high: 1.0,
        medium: 0.85,
        low: 0.75,
    }
}
fn default_rounding_minutes() -> i64 {
    5
}
fn default_min_block_minutes() -> i64 {
    10
}
fn default_lookbehind_minutes() -> i64 {
    24 * 60
}
fn default_lookahead_minutes() -> i64 {
    24 * 60
}
fn default_idle_timeout_minutes() -> i64 {
    24 * 60
}
fn default_drift_tolerance_secs() -> i64 {
    60
}
fn default_lease_key() -> String {
    "paceline-accountability-loop".to_string()
}
fn default_store_retry_attempts() -> u32 {
    3
}
fn default_store_retry_backoff_ms() -> u64 {
    500
}
fn default_max_concurrent_users() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
