//! Infrastructure layer.
//!
//! Technical building blocks without replication logic of their own.
//!
//! - [`conflate`]: single-slot conflating channel.
//! - [`batch`]: backpressure-aware batch executor.
//! - [`broadcast`]: in-process symbol-keyed record feed.
//! - [`backoff`]: exponential retry delays.
//! - [`shutdown`]: cooperative cancellation signal.
//! - [`config`]: configuration loading, validation and logging bootstrap.

pub mod backoff;
pub mod batch;
pub mod broadcast;
pub mod config;
pub mod conflate;
pub mod shutdown;

pub use backoff::Backoff;
pub use batch::{BatchExecutor, ExecutorCompleted};
pub use broadcast::BroadcastHub;
pub use conflate::{batching, conflating, ChannelClosed, ConflatingReceiver, ConflatingSender};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
