//! Stream reconciler.
//!
//! A receiver task drains the feed subscription into a conflating channel;
//! an applier task reads merged batches and folds them into the view. A
//! slow applier therefore sees one batch holding the newest version of each
//! identity rather than a backlog of events. Lag, a closed topic or an
//! event from another epoch make the applier reload a full snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::Shared;
use crate::domain::{Epoch, Published, Record, RecordSet, Serial};
use crate::infrastructure::config::ReplicationConfig;
use crate::infrastructure::{conflating, Backoff, ConflatingReceiver, ConflatingSender, ShutdownSignal};
use crate::port::outbound::{FeedEvent, FeedSubscription, RecordFeed};

enum StreamItem<R> {
    Event(Published<R>),
    Resync,
}

/// Everything received since the applier's previous read.
struct StreamBatch<R: Record> {
    records: RecordSet<R>,
    epoch: Option<Epoch>,
    serial: Serial,
    resync: bool,
}

impl<R: Record> StreamBatch<R> {
    fn new() -> Self {
        Self {
            records: RecordSet::new(),
            epoch: None,
            serial: 0,
            resync: false,
        }
    }

    fn fold(mut self, item: StreamItem<R>) -> Self {
        match item {
            StreamItem::Event(event) => {
                match self.epoch {
                    Some(epoch) if epoch == event.epoch => {
                        self.serial = self.serial.max(event.serial);
                    }
                    Some(_) => {
                        // Records of the superseded epoch must not outlive it;
                        // the reload restores whatever the new epoch kept.
                        self.records = RecordSet::new();
                        self.epoch = Some(event.epoch);
                        self.serial = event.serial;
                        self.resync = true;
                    }
                    None => {
                        self.epoch = Some(event.epoch);
                        self.serial = event.serial;
                    }
                }
                self.records.apply(event.record);
            }
            StreamItem::Resync => self.resync = true,
        }
        self
    }
}

type BatchSender<R> = ConflatingSender<StreamItem<R>, StreamBatch<R>>;
type BatchReceiver<R> = ConflatingReceiver<StreamItem<R>, StreamBatch<R>, StreamBatch<R>>;

pub(super) fn spawn<R: Record>(
    shared: Arc<Shared<R>>,
    feed: Arc<dyn RecordFeed<R>>,
    subscription: FeedSubscription<R>,
    config: &ReplicationConfig,
    shutdown: ShutdownSignal,
) -> Vec<JoinHandle<()>> {
    let (tx, rx) = conflating(StreamBatch::new, StreamBatch::fold, |batch| batch);
    let receiver = tokio::spawn(receive(
        Arc::clone(&shared),
        feed,
        subscription,
        tx,
        config.retry.initial_delay_ms,
        shutdown.clone(),
    ));
    let applier = tokio::spawn(apply(shared, rx, Backoff::new(&config.retry), shutdown));
    vec![receiver, applier]
}

async fn receive<R: Record>(
    shared: Arc<Shared<R>>,
    feed: Arc<dyn RecordFeed<R>>,
    mut subscription: FeedSubscription<R>,
    tx: BatchSender<R>,
    resubscribe_delay_ms: u64,
    shutdown: ShutdownSignal,
) {
    loop {
        let event = tokio::select! {
            () = shutdown.wait() => break,
            event = subscription.recv() => event,
        };
        let item = match event {
            FeedEvent::Record(published) => StreamItem::Event(published),
            FeedEvent::Lagged(missed) => {
                warn!(kind = %R::KIND, symbol = %shared.symbol, missed, "Replica lagged behind feed");
                StreamItem::Resync
            }
            FeedEvent::Closed => {
                warn!(kind = %R::KIND, symbol = %shared.symbol, "Feed closed, resubscribing");
                tokio::select! {
                    () = shutdown.wait() => break,
                    () = tokio::time::sleep(Duration::from_millis(resubscribe_delay_ms)) => {}
                }
                subscription = feed.subscribe(&shared.symbol);
                StreamItem::Resync
            }
        };
        if tx.write(item).is_err() {
            break;
        }
    }
    debug!(kind = %R::KIND, symbol = %shared.symbol, "Stream receiver stopped");
}

async fn apply<R: Record>(
    shared: Arc<Shared<R>>,
    mut rx: BatchReceiver<R>,
    mut backoff: Backoff,
    shutdown: ShutdownSignal,
) {
    while let Some(batch) = rx.read().await {
        let current = shared.position().0;
        let foreign = batch.epoch.is_some_and(|epoch| epoch != current);
        if batch.resync || foreign {
            let Some(snapshot) = shared.fetch_snapshot(&mut backoff, &shutdown).await else {
                break;
            };
            shared.apply_diff(snapshot);
        }

        let Some(epoch) = batch.epoch else {
            continue;
        };
        let records = batch.records.to_vec();
        let count = records.len();
        // A batch of another epoch than the reloaded view is dropped here.
        if shared.apply_records(epoch, batch.serial, records) {
            trace!(symbol = %shared.symbol, records = count, serial = batch.serial, "Applied stream batch");
        }
    }
    debug!(kind = %R::KIND, symbol = %shared.symbol, "Stream applier stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, OrderStatus};
    use crate::testkit::domain::{order, ts};

    fn event(epoch: Epoch, serial: Serial, record: Order) -> StreamItem<Order> {
        StreamItem::Event(Published {
            epoch,
            serial,
            record,
        })
    }

    #[test]
    fn fold_keeps_newest_version_per_identity() {
        let epoch = Epoch::generate();
        let batch = StreamBatch::new()
            .fold(event(epoch, 1, order(1).updated(ts(1)).build()))
            .fold(event(epoch, 2, order(1).status(OrderStatus::Filled).updated(ts(2)).build()))
            .fold(event(epoch, 3, order(2).updated(ts(2)).build()));

        assert_eq!(batch.serial, 3);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records.to_vec()[0].status, OrderStatus::Filled);
        assert!(!batch.resync);
    }

    #[test]
    fn fold_tracks_latest_epoch_and_resync() {
        let old = Epoch::generate();
        let new = Epoch::generate();
        let batch = StreamBatch::new()
            .fold(event(old, 7, order(1).build()))
            .fold(StreamItem::Resync)
            .fold(event(new, 1, order(2).build()));

        assert_eq!(batch.epoch, Some(new));
        assert_eq!(batch.serial, 1);
        assert!(batch.resync);
    }

    #[test]
    fn epoch_change_discards_records_of_the_old_epoch() {
        let old = Epoch::generate();
        let new = Epoch::generate();
        let batch = StreamBatch::new()
            .fold(event(old, 7, order(1).build()))
            .fold(event(new, 1, order(2).build()));

        assert!(batch.resync);
        assert_eq!(batch.epoch, Some(new));
        let ids: Vec<u64> = batch.records.to_vec().iter().map(|o| o.id.value()).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn first_event_does_not_force_a_reload() {
        let batch = StreamBatch::new().fold(event(Epoch::generate(), 3, order(1).build()));
        assert!(!batch.resync);
        assert_eq!(batch.records.len(), 1);
    }
}
