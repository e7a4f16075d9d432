//! Single-slot conflating channel.
//!
//! Writers fold items into one pending accumulator without blocking. The
//! single reader takes the accumulator, finishes it into a result and gets
//! everything written since its previous read in one value. A slow reader
//! therefore never sees a backlog, only the latest merged state.
//!
//! ```text
//! write(1) write(2) write(3)      read() -> finish(fold(fold(fold(seed, 1), 2), 3))
//!                                 read() -> (suspends until the next write)
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

type SeedFn<A> = Box<dyn Fn() -> A + Send + Sync>;
type FoldFn<I, A> = Box<dyn Fn(A, I) -> A + Send + Sync>;
type FinishFn<A, R> = Box<dyn Fn(A) -> R + Send + Sync>;

/// The reader was dropped; written items can no longer be observed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("conflating channel closed")]
pub struct ChannelClosed;

struct Shared<I, A> {
    slot: Mutex<Option<A>>,
    seed: SeedFn<A>,
    fold: FoldFn<I, A>,
    notify: Notify,
    senders: AtomicUsize,
    reader_alive: AtomicBool,
}

/// Create a conflating channel.
///
/// `seed` produces an empty accumulator, `fold` merges one written item into
/// it and `finish` turns the accumulator into what the reader receives.
pub fn conflating<I, A, R>(
    seed: impl Fn() -> A + Send + Sync + 'static,
    fold: impl Fn(A, I) -> A + Send + Sync + 'static,
    finish: impl Fn(A) -> R + Send + Sync + 'static,
) -> (ConflatingSender<I, A>, ConflatingReceiver<I, A, R>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        seed: Box::new(seed),
        fold: Box::new(fold),
        notify: Notify::new(),
        senders: AtomicUsize::new(1),
        reader_alive: AtomicBool::new(true),
    });
    (
        ConflatingSender {
            shared: Arc::clone(&shared),
        },
        ConflatingReceiver {
            shared,
            finish: Box::new(finish),
        },
    )
}

/// Conflating channel whose result is the list of written items.
pub fn batching<I>() -> (ConflatingSender<I, Vec<I>>, ConflatingReceiver<I, Vec<I>, Vec<I>>)
where
    I: Send + 'static,
{
    conflating(
        Vec::new,
        |mut acc: Vec<I>, item| {
            acc.push(item);
            acc
        },
        |acc| acc,
    )
}

/// Writing half. Cheap to clone; any number of writers may exist.
pub struct ConflatingSender<I, A> {
    shared: Arc<Shared<I, A>>,
}

impl<I, A> ConflatingSender<I, A> {
    /// Fold `item` into the pending accumulator. Never blocks on the reader.
    pub fn write(&self, item: I) -> Result<(), ChannelClosed> {
        if !self.shared.reader_alive.load(Ordering::Acquire) {
            return Err(ChannelClosed);
        }
        {
            let mut slot = self.shared.slot.lock();
            let acc = slot.take().unwrap_or_else(|| (self.shared.seed)());
            *slot = Some((self.shared.fold)(acc, item));
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Whether a value is waiting for the reader.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.shared.slot.lock().is_some()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.shared.reader_alive.load(Ordering::Acquire)
    }
}

impl<I, A> Clone for ConflatingSender<I, A> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I, A> Drop for ConflatingSender<I, A> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Last writer gone: wake the reader so it can observe the close.
            self.shared.notify.notify_one();
        }
    }
}

/// Reading half. There is exactly one per channel; `read` takes `&mut self`
/// so concurrent reads are rejected at compile time.
pub struct ConflatingReceiver<I, A, R> {
    shared: Arc<Shared<I, A>>,
    finish: FinishFn<A, R>,
}

impl<I, A, R> ConflatingReceiver<I, A, R> {
    /// Take everything written since the previous read.
    ///
    /// Suspends until a write happens. Returns `None` once every writer has
    /// been dropped and nothing is pending.
    pub async fn read(&mut self) -> Option<R> {
        loop {
            if let Some(result) = self.try_read() {
                return Some(result);
            }
            if self.shared.senders.load(Ordering::Acquire) == 0 {
                // A final write may have raced with the last drop.
                return self.try_read();
            }
            self.shared.notify.notified().await;
        }
    }

    /// Take the pending value without waiting.
    pub fn try_read(&mut self) -> Option<R> {
        let acc = self.shared.slot.lock().take()?;
        Some((self.finish)(acc))
    }
}

impl<I, A, R> Drop for ConflatingReceiver<I, A, R> {
    fn drop(&mut self) {
        self.shared.reader_alive.store(false, Ordering::Release);
    }
}
