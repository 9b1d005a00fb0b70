//! Runtime configuration for the sync core.
//!
//! Settings are constructed explicitly and injected into the engine and
//! monitor; nothing reads ambient globals at use time. `from_env` exists as a
//! convenience for binaries.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

/// Retry and backoff policy for action delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Failed attempts after which an action is marked failed
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied per additional attempt
    pub factor: u32,
    /// Ceiling for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            factor: 2,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry attempt `attempt` (1-based):
    /// `min(base * factor^(attempt - 1), max_delay)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self
            .factor
            .checked_pow(exponent)
            .map_or(u64::MAX, u64::from);
        let delay = self
            .base_delay
            .as_millis()
            .saturating_mul(u128::from(multiplier));
        let capped = delay.min(self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }
}

/// Settings for the sync engine and connectivity monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Remote endpoint queued actions are POSTed to
    pub endpoint: Option<String>,
    /// URL probed for connectivity quality (defaults to the endpoint)
    pub probe_url: Option<String>,
    /// Identifier of this device, attached to conflict resolutions
    pub device_id: String,
    /// Bound on each sync POST
    pub request_timeout: Duration,
    /// Fixed interval between quality probes
    pub probe_interval: Duration,
    /// Age after which a `syncing` action is considered abandoned
    pub stale_syncing_threshold: Duration,
    /// Retry/backoff policy
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            probe_url: None,
            device_id: uuid::Uuid::now_v7().to_string(),
            request_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_secs(30),
            stale_syncing_threshold: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncSettings {
    /// Create settings pointing at the given sync endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Read settings from `STOCKPILE_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self {
            endpoint: normalize_text_option(env::var("STOCKPILE_SYNC_ENDPOINT").ok()),
            probe_url: normalize_text_option(env::var("STOCKPILE_PROBE_URL").ok()),
            ..Self::default()
        };
        if let Some(device_id) = normalize_text_option(env::var("STOCKPILE_DEVICE_ID").ok()) {
            settings.device_id = device_id;
        }
        settings
    }

    /// Override the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL used by the connectivity probe
    #[must_use]
    pub fn effective_probe_url(&self) -> Option<&str> {
        self.probe_url.as_deref().or(self.endpoint.as_deref())
    }

    /// Check if a sync endpoint is configured
    pub const fn is_sync_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}
