//! In-process record feed backed by one `tokio::sync::broadcast` channel per
//! symbol.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::{Published, Record, Symbol};
use crate::port::outbound::{FeedSubscription, RecordFeed};

/// Symbol-keyed topics created on first use.
pub struct BroadcastHub<R> {
    capacity: usize,
    topics: DashMap<Symbol, broadcast::Sender<Published<R>>>,
}

impl<R: Record> BroadcastHub<R> {
    /// `capacity` events are retained per topic before slow subscribers lag.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: DashMap::new(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, symbol: &Symbol) -> usize {
        self.topics
            .get(symbol)
            .map_or(0, |topic| topic.receiver_count())
    }

    fn topic(&self, symbol: &Symbol) -> broadcast::Sender<Published<R>> {
        self.topics
            .entry(symbol.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl<R: Record> RecordFeed<R> for BroadcastHub<R> {
    fn publish(&self, event: Published<R>) {
        let topic = self.topic(event.record.symbol());
        let serial = event.serial;
        if topic.send(event).is_err() {
            trace!(serial, "Published without subscribers");
        }
    }

    fn subscribe(&self, symbol: &Symbol) -> FeedSubscription<R> {
        FeedSubscription::new(symbol.clone(), self.topic(symbol).subscribe())
    }
}
