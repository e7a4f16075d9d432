//! Long-poll wait-list.
//!
//! A diff request that cannot be answered yet is parked here with its own
//! timer. The actor completes parked requests after every accepted write
//! batch; a timer that fires first makes the actor answer with an empty diff
//! at the caller's current watermark.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::trace;

use super::state::AuthorityState;
use crate::domain::{Diff, Epoch, Record, Serial};

pub(crate) type WaiterKey = (Serial, u64);

struct Waiter<R> {
    reply: oneshot::Sender<Diff<R>>,
    timer: JoinHandle<()>,
}

/// Pending diff requests, ordered by the serial they wait for.
pub(crate) struct WaitList<R> {
    next_id: u64,
    waiters: BTreeMap<WaiterKey, Waiter<R>>,
    expired: mpsc::UnboundedSender<WaiterKey>,
}

impl<R: Record> WaitList<R> {
    /// Create a wait-list and the receiver on which expired timers report.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<WaiterKey>) {
        let (expired, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_id: 0,
                waiters: BTreeMap::new(),
                expired,
            },
            expired_rx,
        )
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Park a request for serial `from` for at most `wait`.
    pub(crate) fn park(&mut self, from: Serial, wait: Duration, reply: oneshot::Sender<Diff<R>>) {
        self.next_id += 1;
        let key = (from, self.next_id);
        let expired = self.expired.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = expired.send(key);
        });
        self.waiters.insert(key, Waiter { reply, timer });
    }

    /// Answer a request whose timer fired with an empty diff at `from - 1`.
    pub(crate) fn expire(&mut self, key: WaiterKey, epoch: Epoch) {
        if let Some(waiter) = self.waiters.remove(&key) {
            trace!(from = key.0, "Long poll timed out");
            let _ = waiter.reply.send(Diff::empty(epoch, key.0.saturating_sub(1)));
        }
    }

    /// Answer every request the state can now satisfy.
    pub(crate) fn complete(&mut self, state: &AuthorityState<R>) -> usize {
        let ready_below = (state.max_serial().saturating_add(1), 0);
        let pending = self.waiters.split_off(&ready_below);
        let ready = std::mem::replace(&mut self.waiters, pending);

        let count = ready.len();
        for ((from, _), waiter) in ready {
            waiter.timer.abort();
            if let Some(diff) = state.diff_since(state.epoch(), from) {
                let _ = waiter.reply.send(diff);
            }
        }
        count
    }

    /// Answer every parked request with an empty diff, used on shutdown.
    pub(crate) fn release_all(&mut self, epoch: Epoch) {
        for ((from, _), waiter) in std::mem::take(&mut self.waiters) {
            waiter.timer.abort();
            let _ = waiter.reply.send(Diff::empty(epoch, from.saturating_sub(1)));
        }
    }
}

impl<R> Drop for WaitList<R> {
    fn drop(&mut self) {
        for waiter in self.waiters.values() {
            waiter.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, Symbol};
    use crate::testkit::domain::order;

    fn state() -> AuthorityState<Order> {
        AuthorityState::load(Symbol::new("BTCUSDT"), Vec::new())
    }

    #[tokio::test]
    async fn complete_answers_only_satisfiable_requests() {
        let mut state = state();
        let (mut waiters, _expired) = WaitList::<Order>::new();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        waiters.park(1, Duration::from_secs(60), tx1);
        waiters.park(2, Duration::from_secs(60), tx2);

        state.submit(order(1).build()).unwrap();
        assert_eq!(waiters.complete(&state), 1);
        assert_eq!(waiters.len(), 1);

        let diff = rx1.try_recv().unwrap();
        assert_eq!(diff.max_serial, 1);
        assert_eq!(diff.records.len(), 1);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn timer_reports_expiry_and_answers_empty_diff() {
        let state = state();
        let (mut waiters, mut expired) = WaitList::<Order>::new();
        let (tx, rx) = oneshot::channel();
        waiters.park(5, Duration::from_millis(10), tx);

        let key = expired.recv().await.unwrap();
        assert_eq!(key.0, 5);
        waiters.expire(key, state.epoch());

        let diff = rx.await.unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.max_serial, 4);
        assert_eq!(diff.epoch, state.epoch());
        assert_eq!(waiters.len(), 0);
    }

    #[tokio::test]
    async fn completed_waiter_ignores_late_expiry() {
        let mut state = state();
        let (mut waiters, mut expired) = WaitList::<Order>::new();
        let (tx, rx) = oneshot::channel();
        waiters.park(1, Duration::from_millis(5), tx);
        state.submit(order(1).build()).unwrap();
        waiters.complete(&state);
        assert_eq!(rx.await.unwrap().records.len(), 1);

        let late = tokio::time::timeout(Duration::from_millis(30), expired.recv()).await;
        if let Ok(Some(key)) = late {
            waiters.expire(key, state.epoch());
        }
        assert_eq!(waiters.len(), 0);
    }

    #[tokio::test]
    async fn release_all_answers_everyone() {
        let state = state();
        let (mut waiters, _expired) = WaitList::<Order>::new();
        let (tx, rx) = oneshot::channel();
        waiters.park(3, Duration::from_secs(60), tx);
        waiters.release_all(state.epoch());
        let diff = rx.await.unwrap();
        assert_eq!(diff.max_serial, 2);
        assert_eq!(waiters.len(), 0);
    }
}
