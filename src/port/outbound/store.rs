//! Durable storage contract consumed by the authority.

use std::future::Future;

use crate::domain::{Record, Symbol};
use crate::error::Result;

/// Per-symbol durable record storage.
pub trait RecordStore<R: Record>: Send + Sync + 'static {
    /// Load every stored record of a symbol.
    fn load_all(&self, symbol: &Symbol) -> impl Future<Output = Result<Vec<R>>> + Send;

    /// Upsert records by identity. Saving an already stored record is a no-op
    /// in effect, so the same batch may be retried safely.
    fn save_many(&self, records: &[R]) -> impl Future<Output = Result<()>> + Send;
}
