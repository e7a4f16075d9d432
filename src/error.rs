use thiserror::Error;

use crate::domain::{RecordKind, Symbol};

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Replication protocol faults.
///
/// Staleness, epoch changes and poll timeouts are not errors; only
/// conditions the caller cannot recover from locally end up here.
#[derive(Error, Debug, Clone)]
pub enum ReplicationError {
    #[error("{kind} index corrupted for {symbol}: {detail}")]
    IndexCorrupted {
        kind: RecordKind,
        symbol: Symbol,
        detail: String,
    },

    #[error("{kind} authority for {symbol} is unavailable")]
    AuthorityUnavailable { kind: RecordKind, symbol: Symbol },

    #[error("{kind} replica for {symbol} is shut down")]
    ReplicaUnavailable { kind: RecordKind, symbol: Symbol },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    #[error("record store unavailable for {symbol} after {attempts} attempts: {reason}")]
    StoreUnavailable {
        symbol: Symbol,
        attempts: u32,
        reason: String,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
