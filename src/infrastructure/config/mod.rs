//! Infrastructure configuration modules.

pub mod database;
pub mod logging;
pub mod replication;
pub mod settings;

pub use database::DatabaseConfig;
pub use logging::LoggingConfig;
pub use replication::{ReplicationConfig, RetryConfig, Transport};
pub use settings::Config;
