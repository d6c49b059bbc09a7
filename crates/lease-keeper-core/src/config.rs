//! Broker-wide queue configuration.
//!
//! Every queue in a broker shares one [`BrokerConfig`]. Values are expressed
//! in whole seconds so they read naturally in YAML/TOML files and
//! environment variables.

use crate::queue::{
    QueueSettings, DEFAULT_LEASE_DURATION, DEFAULT_MAX_DELIVERY_COUNT,
    DEFAULT_RECLAIM_BATCH_SIZE, DEFAULT_RECLAIM_INTERVAL,
};
use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a claim waits for a message
pub const DEFAULT_CLAIM_WAIT: Duration = Duration::from_secs(5);

/// Queue behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Visibility window granted to a claimant (seconds)
    #[serde(default = "default_lease_duration_seconds")]
    pub lease_duration_seconds: u64,

    /// Deliveries allowed before a message is dead-lettered
    #[serde(default = "default_max_delivery_count")]
    pub max_delivery_count: u32,

    /// Period of the expired-lease sweep (seconds)
    #[serde(default = "default_reclaim_interval_seconds")]
    pub reclaim_interval_seconds: u64,

    /// Maximum messages moved per sweep
    #[serde(default = "default_reclaim_batch_size")]
    pub reclaim_batch_size: usize,

    /// How long a claim waits for a message before timing out (seconds)
    #[serde(default = "default_claim_wait_seconds")]
    pub claim_wait_seconds: u64,
}

impl BrokerConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lease_duration_seconds == 0 {
            return Err(ValidationError::OutOfRange {
                field: "lease_duration_seconds".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.max_delivery_count == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_delivery_count".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.reclaim_interval_seconds == 0 {
            return Err(ValidationError::OutOfRange {
                field: "reclaim_interval_seconds".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.reclaim_batch_size == 0 {
            return Err(ValidationError::OutOfRange {
                field: "reclaim_batch_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Settings handed to every queue engine
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            lease_duration: Duration::from_secs(self.lease_duration_seconds),
            max_delivery_count: self.max_delivery_count,
            reclaim_interval: Duration::from_secs(self.reclaim_interval_seconds),
            reclaim_batch_size: self.reclaim_batch_size,
        }
    }

    /// Claim window used by transports
    pub fn claim_wait(&self) -> Duration {
        Duration::from_secs(self.claim_wait_seconds)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            lease_duration_seconds: default_lease_duration_seconds(),
            max_delivery_count: default_max_delivery_count(),
            reclaim_interval_seconds: default_reclaim_interval_seconds(),
            reclaim_batch_size: default_reclaim_batch_size(),
            claim_wait_seconds: default_claim_wait_seconds(),
        }
    }
}

fn default_lease_duration_seconds() -> u64 {
    DEFAULT_LEASE_DURATION.as_secs()
}

fn default_max_delivery_count() -> u32 {
    DEFAULT_MAX_DELIVERY_COUNT
}

fn default_reclaim_interval_seconds() -> u64 {
    DEFAULT_RECLAIM_INTERVAL.as_secs()
}

fn default_reclaim_batch_size() -> usize {
    DEFAULT_RECLAIM_BATCH_SIZE
}

fn default_claim_wait_seconds() -> u64 {
    DEFAULT_CLAIM_WAIT.as_secs()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
