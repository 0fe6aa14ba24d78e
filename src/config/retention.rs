//! Video retention configuration.
//!
//! Videos older than `max_age_months` calendar months are deleted together
//! with their stored files.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_hours = 24
//! max_age_months = 9
//! trigger_token = "${CLEANUP_TRIGGER_TOKEN}"
//!
//! [retention.retry]
//! max_retries = 3
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Video retention configuration.
///
/// When `enabled`, a background worker runs the cleanup every
/// `interval_hours`. The cleanup can also be triggered externally through
/// `POST /functions/cleanup-old-videos` or `cinebaby cleanup`, regardless of
/// `enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether the in-process worker runs.
    /// Default: false (an external scheduler may call the HTTP trigger instead)
    #[serde(default)]
    pub enabled: bool,

    /// How often the worker runs, in hours.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Age, in calendar months, after which a video is deleted.
    #[serde(default = "default_max_age_months")]
    pub max_age_months: u32,

    /// Number of candidate videos fetched per query.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Bearer token required by the HTTP trigger. Unset means open.
    #[serde(default)]
    pub trigger_token: Option<String>,

    /// Retry policy for individual store calls.
    #[serde(default)]
    pub retry: RetentionRetryConfig,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            max_age_months: default_max_age_months(),
            page_size: default_page_size(),
            trigger_token: None,
            retry: RetentionRetryConfig::default(),
        }
    }
}

impl RetentionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "retention.interval_hours must be at least 1".into(),
            ));
        }
        if self.max_age_months == 0 {
            return Err(ConfigError::Validation(
                "retention.max_age_months must be at least 1".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "retention.page_size must be at least 1".into(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(
                "retention.retry.backoff_multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

fn default_interval_hours() -> u64 {
    24
}

fn default_max_age_months() -> u32 {
    9
}

fn default_page_size() -> u32 {
    500
}

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionRetryConfig {
    /// Whether retries are enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of retries (not including the first attempt).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetentionRetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetentionRetryConfig {
    /// A policy that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        if self.enabled { self.max_retries + 1 } else { 1 }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(base.min(self.max_delay_ms as f64) as u64)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
