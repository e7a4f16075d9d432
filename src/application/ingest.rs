//! Ingest pump between exchange-side producers and the authority.
//!
//! Producers write records into a conflating channel that keeps only the
//! newest version of each identity per symbol. The pump reads merged batches
//! and submits them, so a burst of updates for one order costs a single
//! submission once the authority catches up.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{Record, RecordSet, Symbol};
use crate::infrastructure::config::RetryConfig;
use crate::infrastructure::{
    conflating, Backoff, ChannelClosed, ConflatingReceiver, ConflatingSender, ShutdownSignal,
};
use crate::port::outbound::AuthorityApi;

type Pending<R> = BTreeMap<Symbol, RecordSet<R>>;

/// Create a connected sink and pump.
#[must_use]
pub fn ingest_channel<R: Record>(
    authority: Arc<dyn AuthorityApi<R>>,
    retry: RetryConfig,
) -> (IngestSink<R>, IngestPump<R>) {
    let (tx, rx) = conflating(
        Pending::new,
        |mut pending: Pending<R>, record: R| {
            pending
                .entry(record.symbol().clone())
                .or_default()
                .apply(record);
            pending
        },
        |pending| pending,
    );
    (
        IngestSink { tx },
        IngestPump {
            rx,
            authority,
            retry,
        },
    )
}

/// Producer side. Cheap to clone; writes never wait on the authority.
pub struct IngestSink<R: Record> {
    tx: ConflatingSender<R, Pending<R>>,
}

impl<R: Record> Clone for IngestSink<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<R: Record> IngestSink<R> {
    /// Queue a record for submission.
    ///
    /// # Errors
    ///
    /// Fails once the pump has stopped.
    pub fn write(&self, record: R) -> Result<(), ChannelClosed> {
        self.tx.write(record)
    }

    pub fn write_many(&self, records: impl IntoIterator<Item = R>) -> Result<(), ChannelClosed> {
        records.into_iter().try_for_each(|record| self.tx.write(record))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Totals reported when the pump stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub batches: u64,
    pub submitted: usize,
    pub accepted: usize,
    pub dropped: usize,
}

/// Consumer side, driven by [`IngestPump::run`].
pub struct IngestPump<R: Record> {
    rx: ConflatingReceiver<R, Pending<R>, Pending<R>>,
    authority: Arc<dyn AuthorityApi<R>>,
    retry: RetryConfig,
}

impl<R: Record> IngestPump<R> {
    /// Submit merged batches until every sink is dropped or shutdown.
    ///
    /// On shutdown whatever is already pending gets one final submission
    /// attempt per symbol.
    pub async fn run(mut self, shutdown: ShutdownSignal) -> IngestStats {
        let mut stats = IngestStats::default();
        let mut backoff = Backoff::new(&self.retry);
        loop {
            let pending = tokio::select! {
                () = shutdown.wait() => break,
                pending = self.rx.read() => pending,
            };
            let Some(pending) = pending else {
                break;
            };
            stats.batches += 1;
            for (symbol, records) in pending {
                self.submit(&symbol, records.to_vec(), &mut backoff, &shutdown, &mut stats)
                    .await;
            }
        }

        if let Some(pending) = self.rx.try_read() {
            stats.batches += 1;
            for (symbol, records) in pending {
                let records = records.to_vec();
                let count = records.len();
                stats.submitted += count;
                match self.authority.submit_many(&symbol, records).await {
                    Ok(receipt) => stats.accepted += receipt.accepted,
                    Err(e) => {
                        stats.dropped += count;
                        warn!(kind = %R::KIND, symbol = %symbol, records = count, error = %e, "Final ingest flush failed");
                    }
                }
            }
        }

        info!(
            kind = %R::KIND,
            batches = stats.batches,
            submitted = stats.submitted,
            accepted = stats.accepted,
            dropped = stats.dropped,
            "Ingest pump stopped"
        );
        stats
    }

    async fn submit(
        &self,
        symbol: &Symbol,
        records: Vec<R>,
        backoff: &mut Backoff,
        shutdown: &ShutdownSignal,
        stats: &mut IngestStats,
    ) {
        let count = records.len();
        stats.submitted += count;
        loop {
            match self.authority.submit_many(symbol, records.clone()).await {
                Ok(receipt) => {
                    backoff.reset();
                    stats.accepted += receipt.accepted;
                    debug!(
                        kind = %R::KIND,
                        symbol = %symbol,
                        records = count,
                        accepted = receipt.accepted,
                        serial = receipt.serial,
                        "Ingested batch"
                    );
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        kind = %R::KIND,
                        symbol = %symbol,
                        records = count,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Ingest submission failed, retrying"
                    );
                    tokio::select! {
                        () = shutdown.wait() => {
                            stats.dropped += count;
                            warn!(kind = %R::KIND, symbol = %symbol, records = count, "Dropping batch on shutdown");
                            return;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
