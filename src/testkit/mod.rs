//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`]: Builders for orders and trades plus fixed timestamps.
//! - [`store`]: [`RecordingStore`](store::RecordingStore), a record store
//!   that counts calls and fails on demand.
//! - [`config`]: Canonical test configurations with short intervals.

pub mod config;
pub mod domain;
pub mod store;
