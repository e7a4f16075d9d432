//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.
//! Avoids each test module defining its own slightly-different defaults.

use crate::infrastructure::config::{ReplicationConfig, RetryConfig, Transport};

/// Retry config with zero delays, so no test waits on backoff.
pub fn retry() -> RetryConfig {
    RetryConfig {
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
    }
}

/// Replication config with short intervals and small buffers.
///
/// Persistence ticks every 10ms and long polls give up after 200ms.
/// Store loads are attempted three times.
pub fn replication() -> ReplicationConfig {
    ReplicationConfig {
        transport: Transport::LongPoll,
        persist_interval_ms: 10,
        poll_timeout_ms: 200,
        mailbox_capacity: 64,
        broadcast_capacity: 64,
        load_retry_attempts: 3,
        symbols: Vec::new(),
        retry: retry(),
    }
}

/// Same as [`replication`] with the stream transport selected.
pub fn streaming() -> ReplicationConfig {
    ReplicationConfig {
        transport: Transport::Stream,
        ..replication()
    }
}
