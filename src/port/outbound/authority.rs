//! Authority contract, as seen by replicas and ingestion.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Diff, Epoch, Receipt, Record, Serial, Symbol};
use crate::error::Result;

/// Single-writer source of truth for the records of each symbol.
#[async_trait]
pub trait AuthorityApi<R: Record>: Send + Sync {
    /// Apply records under last-write-wins. Stale records are dropped
    /// silently.
    async fn submit_many(&self, symbol: &Symbol, records: Vec<R>) -> Result<Receipt>;

    async fn submit(&self, symbol: &Symbol, record: R) -> Result<Receipt> {
        self.submit_many(symbol, vec![record]).await
    }

    /// Full state as of the call.
    async fn snapshot(&self, symbol: &Symbol) -> Result<Diff<R>>;

    /// Records with serial at or above `from`.
    ///
    /// A foreign `epoch` yields a full snapshot. When nothing is available
    /// yet the call is held for up to `wait` and then answers with an empty
    /// diff at `from - 1`.
    async fn diff_since(
        &self,
        symbol: &Symbol,
        epoch: Epoch,
        from: Serial,
        wait: Duration,
    ) -> Result<Diff<R>>;

    async fn lookup(&self, symbol: &Symbol, id: R::Id) -> Result<Option<R>>;
}
