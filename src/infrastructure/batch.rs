//! Backpressure-aware batch executor.
//!
//! Wraps a (possibly slow) per-batch action. Items posted while the action
//! runs accumulate into the next batch instead of spawning more work, so at
//! most one invocation is in flight and batches run in the order they were
//! formed.
//!
//! # Batch formation
//!
//! - Posting to an idle executor starts an invocation immediately with
//!   everything pending, and opens a fresh batch for later posts.
//! - Posting to a busy executor appends to the pending batch, which becomes
//!   the next invocation once the current one returns.
//! - [`BatchExecutor::complete`] stops intake and waits until the pending
//!   batch has been drained through the action.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type BatchAction<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture + Send + Sync>;

/// The executor was completed and no longer accepts items.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("batch executor already completed")]
pub struct ExecutorCompleted;

struct State<T> {
    pending: Vec<T>,
    running: bool,
    completed: bool,
    batches: u64,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    action: BatchAction<T>,
    idle: Notify,
    name: &'static str,
}

/// Runs an action over batches of posted items with at most one batch in
/// flight. Cloning yields another handle to the same executor.
pub struct BatchExecutor<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> BatchExecutor<T> {
    /// Wrap an asynchronous batch action.
    pub fn new<F, Fut>(name: &'static str, action: F) -> Self
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: BatchAction<T> = Arc::new(move |batch| Box::pin(action(batch)));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    pending: Vec::new(),
                    running: false,
                    completed: false,
                    batches: 0,
                }),
                action,
                idle: Notify::new(),
                name,
            }),
        }
    }

    /// Wrap a synchronous batch action.
    pub fn from_fn<F>(name: &'static str, action: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        let action = Arc::new(action);
        Self::new(name, move |batch| {
            let action = Arc::clone(&action);
            async move { action(batch) }
        })
    }

    /// Post a single item.
    pub fn post(&self, item: T) -> Result<(), ExecutorCompleted> {
        self.post_many(std::iter::once(item))
    }

    /// Post several items. If the executor is idle they form one batch.
    pub fn post_many(&self, items: impl IntoIterator<Item = T>) -> Result<(), ExecutorCompleted> {
        let batch = {
            let mut state = self.inner.state.lock();
            if state.completed {
                debug_assert!(false, "post to completed batch executor '{}'", self.inner.name);
                warn!(executor = self.inner.name, "Dropping items posted after completion");
                return Err(ExecutorCompleted);
            }
            state.pending.extend(items);
            if state.running || state.pending.is_empty() {
                None
            } else {
                state.running = true;
                Some(std::mem::take(&mut state.pending))
            }
        };

        if let Some(batch) = batch {
            self.spawn_run(batch);
        }
        Ok(())
    }

    /// Stop accepting items and wait until every posted item has been
    /// processed.
    pub async fn complete(&self) {
        self.inner.state.lock().completed = true;
        self.wait_idle().await;
        debug!(executor = self.inner.name, "Batch executor completed");
    }

    /// Wait until no invocation is running and nothing is pending.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.inner.state.lock();
                if !state.running && state.pending.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Number of items waiting for the next invocation.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Whether an invocation is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Number of invocations started so far.
    #[must_use]
    pub fn batches_started(&self) -> u64 {
        self.inner.state.lock().batches
    }

    fn spawn_run(&self, first: Vec<T>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut batch = first;
            loop {
                let size = batch.len();
                let number = {
                    let mut state = inner.state.lock();
                    state.batches += 1;
                    state.batches
                };
                debug!(executor = inner.name, batch = number, size, "Running batch");
                (inner.action)(batch).await;

                let next = {
                    let mut state = inner.state.lock();
                    if state.pending.is_empty() {
                        state.running = false;
                        None
                    } else {
                        Some(std::mem::take(&mut state.pending))
                    }
                };
                match next {
                    Some(pending) => batch = pending,
                    None => break,
                }
            }
            inner.idle.notify_waiters();
        });
    }
}

impl<T> Clone for BatchExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
