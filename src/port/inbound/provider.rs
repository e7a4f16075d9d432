//! Read/write surface used by trading workers.

use async_trait::async_trait;

use crate::domain::{Record, Symbol};
use crate::error::Result;

/// Records of one kind, read from a local replica.
///
/// Reads never wait on reconciliation. Writes are routed to the authority
/// according to the configured transport.
#[async_trait]
pub trait RecordProvider<R: Record>: Send + Sync {
    /// Current replicated records of a symbol, ordered by identity.
    async fn get_records(&self, symbol: &Symbol) -> Result<Vec<R>>;

    async fn lookup(&self, symbol: &Symbol, id: R::Id) -> Result<Option<R>>;

    async fn set_record(&self, record: R) -> Result<()> {
        self.set_many(vec![record]).await
    }

    /// Submit records, possibly spanning several symbols.
    async fn set_many(&self, records: Vec<R>) -> Result<()>;
}
