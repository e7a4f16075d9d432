//! Debounced persistence of accepted changes.
//!
//! Each tick hands the records changed since the last tick to a batch
//! executor wrapping the store, tagged with the serial range they cover.
//! The executor reports back per invocation and the actor moves its
//! watermarks:
//!
//! - `posted`: highest serial handed to the executor.
//! - `saved`: highest serial such that every change up to it is stored.
//!
//! `saved` only advances over a contiguous prefix. A failed range rewinds
//! `posted`, so the next tick collects it again.
//!
//! Explicit flushes never block the actor: the reply is parked until a
//! report moves `saved` past the flush target, or a failure is reported.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::state::AuthorityState;
use crate::domain::{Record, RecordSet, Serial, Symbol};
use crate::infrastructure::BatchExecutor;
use crate::port::outbound::RecordStore;

/// Records covering the serial range `(after, upto]`.
pub(crate) struct Chunk<R> {
    after: Serial,
    upto: Serial,
    records: Vec<R>,
}

/// Outcome of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PersistReport {
    Saved { after: Serial, upto: Serial },
    Failed { after: Serial, upto: Serial, reason: String },
}

pub(crate) struct Persistence<R> {
    symbol: Symbol,
    executor: BatchExecutor<Chunk<R>>,
    reports: mpsc::UnboundedReceiver<PersistReport>,
    posted: Serial,
    saved: Serial,
    flushes: Vec<(Serial, oneshot::Sender<Serial>)>,
}

impl<R: Record> Persistence<R> {
    /// Start with everything up to `loaded` considered saved.
    pub(crate) fn new<S>(symbol: Symbol, store: Arc<S>, loaded: Serial) -> Self
    where
        S: RecordStore<R>,
    {
        let (report_tx, reports) = mpsc::unbounded_channel();
        let executor = BatchExecutor::new("persist", move |chunks: Vec<Chunk<R>>| {
            let store = Arc::clone(&store);
            let report_tx = report_tx.clone();
            async move {
                let report = save_chunks(store.as_ref(), chunks).await;
                let _ = report_tx.send(report);
            }
        });

        Self {
            symbol,
            executor,
            reports,
            posted: loaded,
            saved: loaded,
            flushes: Vec::new(),
        }
    }

    pub(crate) fn saved(&self) -> Serial {
        self.saved
    }

    /// Flush replies still waiting on the store.
    pub(crate) fn pending_flushes(&self) -> usize {
        self.flushes.len()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.executor.is_running() || self.executor.pending_len() > 0
    }

    /// Receive the next executor report.
    pub(crate) async fn next_report(&mut self) -> Option<PersistReport> {
        self.reports.recv().await
    }

    /// Hand every change not yet posted to the executor.
    pub(crate) fn tick(&mut self, state: &AuthorityState<R>) {
        let upto = state.max_serial();
        if upto <= self.posted {
            return;
        }
        let after = self.posted;
        let records = state.collect(after, upto);
        debug!(
            symbol = %self.symbol,
            after,
            upto,
            records = records.len(),
            "Posting changes for persistence"
        );
        if self
            .executor
            .post(Chunk {
                after,
                upto,
                records,
            })
            .is_ok()
        {
            self.posted = upto;
        }
    }

    pub(crate) fn on_report(&mut self, report: PersistReport) {
        match report {
            PersistReport::Saved { after, upto } => {
                if after <= self.saved {
                    self.saved = self.saved.max(upto);
                    debug!(symbol = %self.symbol, saved = self.saved, "Changes persisted");
                    let saved = self.saved;
                    self.answer_flushes(|target| target <= saved);
                } else {
                    debug!(
                        symbol = %self.symbol,
                        after,
                        saved = self.saved,
                        "Saved range ahead of watermark"
                    );
                }
            }
            PersistReport::Failed {
                after,
                upto,
                reason,
            } => {
                warn!(
                    symbol = %self.symbol,
                    after,
                    upto,
                    error = %reason,
                    "Persistence failed, range will be retried"
                );
                self.posted = self.posted.min(after).max(self.saved);
                self.answer_flushes(|_| true);
            }
        }
    }

    /// Post whatever is left and answer `reply` with the saved watermark
    /// once everything accepted so far is stored. A failed save answers
    /// with the watermark as it stands.
    pub(crate) fn flush(&mut self, state: &AuthorityState<R>, reply: oneshot::Sender<Serial>) {
        self.tick(state);
        let target = state.max_serial();
        if self.saved >= target {
            let _ = reply.send(self.saved);
        } else {
            self.flushes.push((target, reply));
        }
    }

    /// Final flush; the executor accepts nothing afterwards. A store that
    /// does not finish within `timeout` leaves the remainder unsaved.
    pub(crate) async fn complete(&mut self, state: &AuthorityState<R>, timeout: Duration) {
        self.tick(state);
        if tokio::time::timeout(timeout, self.executor.complete())
            .await
            .is_err()
        {
            warn!(
                symbol = %self.symbol,
                timeout_ms = timeout.as_millis() as u64,
                "Final flush timed out"
            );
        }
        self.drain_reports();
        self.answer_flushes(|_| true);
        if self.saved < state.max_serial() {
            warn!(
                symbol = %self.symbol,
                saved = self.saved,
                max_serial = state.max_serial(),
                "Stopped with unsaved changes"
            );
        } else {
            info!(symbol = %self.symbol, saved = self.saved, "All changes persisted");
        }
    }

    fn drain_reports(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            self.on_report(report);
        }
    }

    fn answer_flushes(&mut self, done: impl Fn(Serial) -> bool) {
        let saved = self.saved;
        let (answered, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.flushes)
            .into_iter()
            .partition(|(target, _)| done(*target));
        self.flushes = waiting;
        for (_, reply) in answered {
            let _ = reply.send(saved);
        }
    }
}

async fn save_chunks<R, S>(store: &S, chunks: Vec<Chunk<R>>) -> PersistReport
where
    R: Record,
    S: RecordStore<R>,
{
    let after = chunks.iter().map(|c| c.after).min().unwrap_or_default();
    let upto = chunks.iter().map(|c| c.upto).max().unwrap_or_default();
    // Several chunks may carry versions of the same identity; only the
    // newest needs storing.
    let merged = RecordSet::from_records(chunks.into_iter().flat_map(|c| c.records));
    let records = merged.to_vec();

    match store.save_many(&records).await {
        Ok(()) => PersistReport::Saved { after, upto },
        Err(e) => PersistReport::Failed {
            after,
            upto,
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, OrderStatus};
    use crate::testkit::domain::{order, ts};
    use crate::testkit::store::RecordingStore;

    async fn flush(persist: &mut Persistence<Order>, state: &AuthorityState<Order>) -> Serial {
        let (reply, mut saved) = oneshot::channel();
        persist.flush(state, reply);
        loop {
            if let Ok(serial) = saved.try_recv() {
                return serial;
            }
            let report = persist.next_report().await.unwrap();
            persist.on_report(report);
        }
    }

    fn state_with(ids: &[u64]) -> AuthorityState<Order> {
        let mut state = AuthorityState::load(Symbol::new("BTCUSDT"), Vec::new());
        for &id in ids {
            state.submit(order(id).updated(ts(1)).build()).unwrap();
        }
        state
    }

    #[tokio::test]
    async fn flush_saves_gap_and_advances_watermark() {
        let store = Arc::new(RecordingStore::<Order>::new());
        let state = state_with(&[1, 2, 3]);
        let mut persist = Persistence::new(Symbol::new("BTCUSDT"), Arc::clone(&store), 0);

        flush(&mut persist, &state).await;

        assert_eq!(persist.saved(), 3);
        assert_eq!(store.save_calls(), 1);
        assert_eq!(store.saved_batches()[0].len(), 3);
    }

    #[tokio::test]
    async fn tick_without_changes_is_a_no_op() {
        let store = Arc::new(RecordingStore::<Order>::new());
        let state = state_with(&[1]);
        let mut persist = Persistence::new(Symbol::new("BTCUSDT"), Arc::clone(&store), 1);

        flush(&mut persist, &state).await;
        assert_eq!(store.save_calls(), 0);
        assert_eq!(persist.saved(), 1);
    }

    #[tokio::test]
    async fn failed_range_is_collected_again() {
        let store = Arc::new(RecordingStore::<Order>::new());
        let mut state = state_with(&[1, 2]);
        let mut persist = Persistence::new(Symbol::new("BTCUSDT"), Arc::clone(&store), 0);

        store.fail_saves(true);
        flush(&mut persist, &state).await;
        assert_eq!(persist.saved(), 0);

        store.fail_saves(false);
        state
            .submit(order(3).status(OrderStatus::Filled).updated(ts(2)).build())
            .unwrap();
        flush(&mut persist, &state).await;

        assert_eq!(persist.saved(), 3);
        let batches = store.saved_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test]
    async fn versions_of_one_identity_are_saved_once() {
        let store = Arc::new(RecordingStore::<Order>::new());
        let mut state = state_with(&[]);
        let mut persist = Persistence::new(Symbol::new("BTCUSDT"), Arc::clone(&store), 0);

        state.submit(order(1).updated(ts(1)).build()).unwrap();
        persist.tick(&state);
        state
            .submit(order(1).status(OrderStatus::Filled).updated(ts(2)).build())
            .unwrap();
        flush(&mut persist, &state).await;

        let saved: Vec<Order> = store.saved_batches().into_iter().flatten().collect();
        assert_eq!(saved.last().map(|o| o.status), Some(OrderStatus::Filled));
        assert_eq!(persist.saved(), 2);
    }

    #[test]
    fn out_of_order_success_does_not_skip_a_gap() {
        let store = Arc::new(RecordingStore::<Order>::new());
        let mut persist: Persistence<Order> =
            Persistence::new(Symbol::new("BTCUSDT"), store, 0);
        persist.posted = 8;

        persist.on_report(PersistReport::Saved { after: 5, upto: 8 });
        assert_eq!(persist.saved(), 0);

        persist.on_report(PersistReport::Failed {
            after: 0,
            upto: 5,
            reason: "disk full".into(),
        });
        assert_eq!(persist.posted, 0);

        persist.on_report(PersistReport::Saved { after: 0, upto: 8 });
        assert_eq!(persist.saved(), 8);
    }

    #[tokio::test]
    async fn flush_reply_waits_for_the_store() {
        let store = Arc::new(RecordingStore::<Order>::new());
        store.slow_saves(Duration::from_millis(100));
        let state = state_with(&[1, 2]);
        let mut persist = Persistence::new(Symbol::new("BTCUSDT"), Arc::clone(&store), 0);

        let (reply, mut saved) = oneshot::channel();
        persist.flush(&state, reply);
        assert_eq!(persist.pending_flushes(), 1);
        assert!(saved.try_recv().is_err());

        let report = persist.next_report().await.unwrap();
        persist.on_report(report);
        assert_eq!(saved.try_recv().unwrap(), 2);
        assert_eq!(persist.pending_flushes(), 0);
    }

    #[tokio::test]
    async fn final_flush_gives_up_on_a_hung_store() {
        let store = Arc::new(RecordingStore::<Order>::new());
        store.slow_saves(Duration::from_secs(30));
        let state = state_with(&[1]);
        let mut persist = Persistence::new(Symbol::new("BTCUSDT"), Arc::clone(&store), 0);

        tokio::time::timeout(
            Duration::from_secs(2),
            persist.complete(&state, Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert_eq!(persist.saved(), 0);
        assert_eq!(store.save_calls(), 1);
    }
}
