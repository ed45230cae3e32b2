//! Upload engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Default number of simultaneous transfers.
pub const DEFAULT_MAX_PARALLEL_UPLOADS: usize = 3;

/// Default number of re-attempts after a retryable failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default interval between simulated progress ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

/// Default percentage added per simulated progress tick.
pub const DEFAULT_TICK_STEP: u8 = 10;

/// Settings for the upload engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// URL documents are posted to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Worker slots (at most this many files are `Uploading`).
    #[serde(default = "default_max_parallel_uploads")]
    pub max_parallel_uploads: usize,

    /// Retries after the first attempt for server-side failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Simulated progress tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Percentage added per simulated tick.
    #[serde(default = "default_tick_step")]
    pub tick_step: u8,

    /// Per-request timeout in seconds. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_endpoint() -> String {
    docdrop_ingest_client::DEFAULT_ENDPOINT.into()
}

fn default_max_parallel_uploads() -> usize {
    DEFAULT_MAX_PARALLEL_UPLOADS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_tick_step() -> u8 {
    DEFAULT_TICK_STEP
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_parallel_uploads: default_max_parallel_uploads(),
            max_retries: default_max_retries(),
            tick_interval_ms: default_tick_interval_ms(),
            tick_step: default_tick_step(),
            request_timeout_secs: None,
        }
    }
}

impl UploadConfig {
    /// Rejects values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.endpoint.trim().is_empty() {
            return Err(UploadError::InvalidConfig("endpoint is empty".into()));
        }
        if self.max_parallel_uploads == 0 {
            return Err(UploadError::InvalidConfig(
                "max_parallel_uploads must be at least 1".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(UploadError::InvalidConfig(
                "tick_interval_ms must be at least 1".into(),
            ));
        }
        if self.tick_step == 0 || self.tick_step > 100 {
            return Err(UploadError::InvalidConfig(
                "tick_step must be between 1 and 100".into(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(UploadError::InvalidConfig(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.endpoint, "http://localhost:3000/api/documents");
        assert_eq!(config.max_parallel_uploads, 3);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.tick_interval(), Duration::from_millis(500));
        assert_eq!(config.tick_step, 10);
        assert!(config.request_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: UploadConfig =
            serde_json::from_str(r#"{"endpoint":"http://ingest.local/api/documents"}"#).unwrap();
        assert_eq!(config.endpoint, "http://ingest.local/api/documents");
        assert_eq!(config.max_parallel_uploads, DEFAULT_MAX_PARALLEL_UPLOADS);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn validate_rejects_zero_slots() {
        let config = UploadConfig {
            max_parallel_uploads: 0,
            ..UploadConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_parallel_uploads"));
    }

    #[test]
    fn validate_rejects_bad_tick_step() {
        for step in [0u8, 101] {
            let config = UploadConfig {
                tick_step: step,
                ..UploadConfig::default()
            };
            assert!(config.validate().is_err(), "step {step} should be rejected");
        }
    }

    #[test]
    fn validate_rejects_empty_endpoint() {
        let config = UploadConfig {
            endpoint: "  ".into(),
            ..UploadConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn request_timeout_converts() {
        let config = UploadConfig {
            request_timeout_secs: Some(30),
            ..UploadConfig::default()
        };
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }
}
