//! Symbol-keyed broadcast topic of accepted records.
//!
//! Delivery is at-least-once; subscribers merge events idempotently by
//! identity and update timestamp.

use tokio::sync::broadcast;

use crate::domain::{Published, Record, Symbol};

/// Publish/subscribe topic per symbol.
pub trait RecordFeed<R: Record>: Send + Sync {
    /// Publish one accepted record. Publishing without subscribers is not an
    /// error.
    fn publish(&self, event: Published<R>);

    /// Subscribe to a symbol. Only events published after this call are
    /// delivered.
    fn subscribe(&self, symbol: &Symbol) -> FeedSubscription<R>;
}

/// What a subscriber observes next.
#[derive(Debug)]
pub enum FeedEvent<R> {
    Record(Published<R>),
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
    /// The topic has no publisher left.
    Closed,
}

/// Receiving end of a feed subscription.
pub struct FeedSubscription<R> {
    symbol: Symbol,
    receiver: broadcast::Receiver<Published<R>>,
}

impl<R: Clone> FeedSubscription<R> {
    #[must_use]
    pub fn new(symbol: Symbol, receiver: broadcast::Receiver<Published<R>>) -> Self {
        Self { symbol, receiver }
    }

    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub async fn recv(&mut self) -> FeedEvent<R> {
        match self.receiver.recv().await {
            Ok(event) => FeedEvent::Record(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => FeedEvent::Lagged(missed),
            Err(broadcast::error::RecvError::Closed) => FeedEvent::Closed,
        }
    }
}
