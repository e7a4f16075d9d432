//! Inbound (driving) ports consumed by callers of the replication core.

pub mod provider;

pub use provider::RecordProvider;
