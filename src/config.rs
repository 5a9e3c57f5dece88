//! Trainer configuration and persisted settings
//!
//! Poka-Yoke: the retention window is validated once, at the boundary.
//! Everything downstream trusts the value it is handed.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted retention window (days)
pub const MIN_EXPIRY_DAYS: u32 = 1;

/// Largest accepted retention window (days)
pub const MAX_EXPIRY_DAYS: u32 = 365;

/// Retention window used when nothing is configured
pub const DEFAULT_EXPIRY_DAYS: u32 = 14;

/// Default period between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default quiet period before a draft is committed
pub const DEFAULT_DRAFT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Check a retention window against the accepted range.
///
/// # Errors
///
/// Returns [`Error::InvalidExpiryDays`] for values outside `1..=365`.
pub fn validate_expiry_days(days: u32) -> Result<u32> {
    if days >= MIN_EXPIRY_DAYS && days <= MAX_EXPIRY_DAYS {
        Ok(days)
    } else {
        Err(Error::InvalidExpiryDays(days))
    }
}

/// User-facing settings, persisted under the `settings` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Retention window for unassisted solves
    pub default_expiry_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }
}

/// Resource limits applied to the embedded interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    /// Operation budget per run (runaway-loop guard)
    pub max_operations: u64,
    /// Maximum function call nesting
    pub max_call_levels: usize,
    /// Maximum expression nesting depth
    pub max_expr_depth: usize,
    /// Maximum string length in bytes
    pub max_string_size: usize,
    /// Maximum array length
    pub max_array_size: usize,
    /// Maximum object map size
    pub max_map_size: usize,
    /// Maximum captured output per run in bytes
    pub max_output_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 5_000_000,
            max_call_levels: 64,
            max_expr_depth: 100,
            max_string_size: 1_000_000,
            max_array_size: 10_000,
            max_map_size: 1_000,
            max_output_size: 1_000_000,
        }
    }
}

/// Trainer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerConfig {
    default_expiry_days: u32,
    sweep_interval: Duration,
    draft_quiet_period: Duration,
    sandbox: SandboxLimits,
}

impl TrainerConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }

    /// Retention window for unassisted solves
    #[must_use]
    pub const fn default_expiry_days(&self) -> u32 {
        self.default_expiry_days
    }

    /// Period between expiry sweeps
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Quiet period before a draft is committed
    #[must_use]
    pub const fn draft_quiet_period(&self) -> Duration {
        self.draft_quiet_period
    }

    /// Interpreter limits
    #[must_use]
    pub const fn sandbox(&self) -> &SandboxLimits {
        &self.sandbox
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            default_expiry_days: DEFAULT_EXPIRY_DAYS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            draft_quiet_period: DEFAULT_DRAFT_QUIET_PERIOD,
            sandbox: SandboxLimits::default(),
        }
    }
}

/// Builder for `TrainerConfig`
#[derive(Debug, Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
}

impl TrainerConfigBuilder {
    /// Set the retention window (validated in [`build`](Self::build))
    #[must_use]
    pub fn default_expiry_days(mut self, days: u32) -> Self {
        self.config.default_expiry_days = days;
        self
    }

    /// Set the period between expiry sweeps
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the draft autosave quiet period
    #[must_use]
    pub fn draft_quiet_period(mut self, period: Duration) -> Self {
        self.config.draft_quiet_period = period;
        self
    }

    /// Set interpreter limits
    #[must_use]
    pub fn sandbox(mut self, limits: SandboxLimits) -> Self {
        self.config.sandbox = limits;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the retention window is out of range or the
    /// sweep interval is zero
    pub fn build(self) -> Result<TrainerConfig> {
        validate_expiry_days(self.config.default_expiry_days)?;
        if self.config.sweep_interval.is_zero() {
            return Err(Error::Other("sweep interval must be non-zero".to_string()));
        }
        Ok(self.config)
    }
}
