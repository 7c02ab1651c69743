use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool and redelivery policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the in-process event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Time a worker may spend on one delivery before it is cancelled.
    #[serde(default = "default_ack_deadline")]
    pub ack_deadline_secs: u64,

    /// Deliveries per event, including the first, before it is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_delivery_attempts: u32,

    #[serde(default = "default_backoff_base")]
    pub redelivery_backoff_base_ms: u64,

    #[serde(default = "default_backoff_max")]
    pub redelivery_backoff_max_ms: u64,
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    100
}

fn default_ack_deadline() -> u64 {
    3900 // encode timeout plus transfer headroom
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1_000
}

fn default_backoff_max() -> u64 {
    60_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            ack_deadline_secs: default_ack_deadline(),
            max_delivery_attempts: default_max_attempts(),
            redelivery_backoff_base_ms: default_backoff_base(),
            redelivery_backoff_max_ms: default_backoff_max(),
        }
    }
}

impl WorkerConfig {
    pub fn ack_deadline(&self) -> Duration {
        Duration::from_secs(self.ack_deadline_secs)
    }

    /// Delay before redelivering after failed attempt number `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, capped at the configured maximum.
    pub fn redelivery_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self
            .redelivery_backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.redelivery_backoff_max_ms);
        Duration::from_millis(delay)
    }
}
