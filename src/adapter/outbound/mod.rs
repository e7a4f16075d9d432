//! Outbound adapters: record stores.

pub mod memory;
pub mod sqlite;
