//! Tradesync - per-symbol order and trade state replication.
//!
//! One authority per symbol owns the record set: it orders accepted writes
//! with serials, answers snapshot and diff queries and persists changes in
//! the background. Replicas keep a local, eventually consistent copy for
//! readers, reconciling by long-polling the authority for diffs or by
//! following a per-symbol broadcast feed.
//!
//! # Architecture
//!
//! - **`domain`** - Records (orders, trades), record sets with
//!   last-write-wins, epochs, serials and diffs
//! - **`port`** - Contracts: record store, broadcast feed, authority API,
//!   record provider
//! - **`application`** - Authority actors, replicas, the provider facade and
//!   the ingest pump
//! - **`infrastructure`** - Conflating channel, batch executor, broadcast
//!   hub, shutdown signal, backoff and configuration
//! - **`adapter`** - SQLite and in-memory stores, CLI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tradesync::adapter::outbound::memory::MemoryRecordStore;
//! use tradesync::application::{AuthorityRegistry, Provider, ReplicaRegistry};
//! use tradesync::domain::{Order, Symbol};
//! use tradesync::infrastructure::config::ReplicationConfig;
//! use tradesync::infrastructure::ShutdownSignal;
//! use tradesync::port::inbound::RecordProvider;
//! use tradesync::port::outbound::AuthorityApi;
//!
//! # async fn demo() -> tradesync::error::Result<()> {
//! let config = ReplicationConfig::default();
//! let store = Arc::new(MemoryRecordStore::<Order>::new());
//! let authority: Arc<dyn AuthorityApi<Order>> = Arc::new(AuthorityRegistry::new(
//!     store,
//!     config.clone(),
//!     ShutdownSignal::never(),
//! ));
//! let replicas = ReplicaRegistry::long_poll(authority, config, ShutdownSignal::never());
//! let orders = Provider::new(Arc::new(replicas));
//! let open = orders.get_records(&Symbol::new("BTCUSDT")).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
