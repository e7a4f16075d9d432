//! Replication tuning: persistence cadence, long-poll bounds, capacities and
//! retry policy.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::Symbol;

/// How replicas reconcile with their authority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Replicas long-poll for diffs; writes go straight to the authority.
    #[default]
    LongPoll,
    /// Replicas follow the broadcast feed; writes go through the local
    /// replica for read-your-write.
    Stream,
}

impl Transport {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LongPoll => "long_poll",
            Self::Stream => "stream",
        }
    }
}

/// Exponential backoff for store loads and authority calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for the delay between retries (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Settings shared by authorities, replicas and the ingest pump.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default)]
    pub transport: Transport,
    /// Period of the authority persistence tick (milliseconds).
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
    /// Longest time an authority holds a diff request open (milliseconds).
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Bounded mailbox size of each authority actor.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Events retained per symbol topic before slow subscribers lag.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Attempts at loading a symbol from the store before giving up.
    #[serde(default = "default_load_retry_attempts")]
    pub load_retry_attempts: u32,
    /// Symbols activated eagerly at startup.
    #[serde(default)]
    pub symbols: Vec<Symbol>,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_persist_interval_ms() -> u64 {
    1_000
}

fn default_poll_timeout_ms() -> u64 {
    15_000
}

fn default_mailbox_capacity() -> usize {
    1_024
}

fn default_broadcast_capacity() -> usize {
    4_096
}

fn default_load_retry_attempts() -> u32 {
    5
}

impl ReplicationConfig {
    #[must_use]
    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            persist_interval_ms: default_persist_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            mailbox_capacity: default_mailbox_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
            load_retry_attempts: default_load_retry_attempts(),
            symbols: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}
