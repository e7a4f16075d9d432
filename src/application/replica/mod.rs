//! Replica service: a locally readable, eventually consistent copy of an
//! authority's records for one symbol.
//!
//! Reads clone an `Arc` of the current [`ReplicaView`] and never wait on
//! reconciliation. A background reconciler (long-poll or stream) builds new
//! views and swaps them in.

mod poll;
mod registry;
mod stream;
mod view;

pub use registry::ReplicaRegistry;
pub use view::ReplicaView;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{Diff, Epoch, Receipt, Record, Serial, Symbol};
use crate::error::{ReplicationError, Result};
use crate::infrastructure::config::{ReplicationConfig, Transport};
use crate::infrastructure::{Backoff, ShutdownSignal};
use crate::port::outbound::{AuthorityApi, RecordFeed};

/// How a replica learns about new changes.
pub enum ReplicaMode<R> {
    LongPoll,
    Stream(Arc<dyn RecordFeed<R>>),
}

impl<R> ReplicaMode<R> {
    #[must_use]
    pub fn transport(&self) -> Transport {
        match self {
            Self::LongPoll => Transport::LongPoll,
            Self::Stream(_) => Transport::Stream,
        }
    }
}

impl<R> Clone for ReplicaMode<R> {
    fn clone(&self) -> Self {
        match self {
            Self::LongPoll => Self::LongPoll,
            Self::Stream(feed) => Self::Stream(Arc::clone(feed)),
        }
    }
}

pub(crate) struct Shared<R: Record> {
    symbol: Symbol,
    authority: Arc<dyn AuthorityApi<R>>,
    view: RwLock<Arc<ReplicaView<R>>>,
    // Serializes view builders; readers only touch `view`.
    writer: Mutex<()>,
    progress: watch::Sender<(Epoch, Serial)>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: Record> Shared<R> {
    fn current(&self) -> Arc<ReplicaView<R>> {
        Arc::clone(&self.view.read())
    }

    fn position(&self) -> (Epoch, Serial) {
        let view = self.current();
        (view.epoch(), view.serial())
    }

    /// Build a new view from the current one and publish it.
    fn update(&self, build: impl FnOnce(&ReplicaView<R>) -> Option<ReplicaView<R>>) -> bool {
        let _writer = self.writer.lock();
        let current = self.current();
        let Some(next) = build(&current) else {
            return false;
        };
        if next.epoch() != current.epoch() {
            info!(
                kind = %R::KIND,
                symbol = %self.symbol,
                epoch = %next.epoch(),
                records = next.len(),
                "Replica resynchronized to new epoch"
            );
        }
        let position = (next.epoch(), next.serial());
        *self.view.write() = Arc::new(next);
        self.progress.send_replace(position);
        true
    }

    fn apply_diff(&self, diff: Diff<R>) -> bool {
        self.update(|view| view.apply_diff(diff))
    }

    fn apply_records(&self, epoch: Epoch, serial: Serial, records: Vec<R>) -> bool {
        self.update(|view| {
            if view.epoch() == epoch {
                view.merge(serial, records)
            } else {
                None
            }
        })
    }

    /// Fetch a full snapshot, retrying until it succeeds or shutdown.
    async fn fetch_snapshot(
        &self,
        backoff: &mut Backoff,
        shutdown: &ShutdownSignal,
    ) -> Option<Diff<R>> {
        loop {
            let result = tokio::select! {
                () = shutdown.wait() => return None,
                result = self.authority.snapshot(&self.symbol) => result,
            };
            match result {
                Ok(diff) => {
                    backoff.reset();
                    return Some(diff);
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        kind = %R::KIND,
                        symbol = %self.symbol,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Snapshot failed, retrying"
                    );
                    tokio::select! {
                        () = shutdown.wait() => return None,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Handle to one replica. Cloning yields another handle to the same
/// replica.
pub struct Replica<R: Record> {
    shared: Arc<Shared<R>>,
    transport: Transport,
}

impl<R: Record> Clone for Replica<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            transport: self.transport,
        }
    }
}

impl<R: Record> Replica<R> {
    /// Load the current state from the authority and start reconciling.
    ///
    /// In stream mode the feed subscription is taken before the snapshot, so
    /// no change falls between the two.
    ///
    /// # Errors
    ///
    /// Fails if no snapshot could be fetched within the load retry budget.
    pub async fn activate(
        symbol: Symbol,
        authority: Arc<dyn AuthorityApi<R>>,
        mode: ReplicaMode<R>,
        config: &ReplicationConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let subscription = match &mode {
            ReplicaMode::Stream(feed) => Some(feed.subscribe(&symbol)),
            ReplicaMode::LongPoll => None,
        };

        let snapshot = initial_snapshot(&symbol, authority.as_ref(), config).await?;
        let view = ReplicaView::from_snapshot(snapshot);
        info!(
            kind = %R::KIND,
            symbol = %symbol,
            transport = mode.transport().as_str(),
            epoch = %view.epoch(),
            serial = view.serial(),
            records = view.len(),
            "Replica activated"
        );

        let (progress, _) = watch::channel((view.epoch(), view.serial()));
        let shared = Arc::new(Shared {
            symbol,
            authority,
            view: RwLock::new(Arc::new(view)),
            writer: Mutex::new(()),
            progress,
            tasks: Mutex::new(Vec::new()),
        });

        let tasks = match (mode.clone(), subscription) {
            (ReplicaMode::Stream(feed), Some(subscription)) => stream::spawn(
                Arc::clone(&shared),
                feed,
                subscription,
                config,
                shutdown,
            ),
            _ => vec![tokio::spawn(poll::run(
                Arc::clone(&shared),
                config.poll_timeout(),
                config.retry.clone(),
                shutdown,
            ))],
        };
        *shared.tasks.lock() = tasks;

        Ok(Self {
            shared,
            transport: mode.transport(),
        })
    }

    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.shared.symbol
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The latest reconciled view. Never blocks on reconciliation.
    #[must_use]
    pub fn view(&self) -> Arc<ReplicaView<R>> {
        self.shared.current()
    }

    /// Current records ordered by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<R> {
        self.view().to_vec()
    }

    /// Records matching `predicate`, ordered by identity.
    pub fn filtered(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        self.view().records().filtered(predicate)
    }

    #[must_use]
    pub fn lookup(&self, id: &R::Id) -> Option<R> {
        self.view().lookup(id).cloned()
    }

    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.view().epoch()
    }

    #[must_use]
    pub fn serial(&self) -> Serial {
        self.view().serial()
    }

    pub async fn submit(&self, record: R) -> Result<Receipt> {
        self.submit_many(vec![record]).await
    }

    /// Forward records to the authority, then apply them locally so the
    /// caller reads its own writes before the next reconciliation.
    pub async fn submit_many(&self, records: Vec<R>) -> Result<Receipt> {
        if !self.is_running() {
            return Err(ReplicationError::ReplicaUnavailable {
                kind: R::KIND,
                symbol: self.shared.symbol.clone(),
            }
            .into());
        }
        let receipt = self
            .shared
            .authority
            .submit_many(&self.shared.symbol, records.clone())
            .await?;
        let local: Vec<R> = records
            .into_iter()
            .filter(|record| record.symbol() == &self.shared.symbol)
            .collect();
        self.shared.update(|view| {
            if view.epoch() == receipt.epoch {
                view.merge(view.serial(), local)
            } else {
                None
            }
        });
        debug!(
            kind = %R::KIND,
            symbol = %self.shared.symbol,
            accepted = receipt.accepted,
            serial = receipt.serial,
            "Submitted through replica"
        );
        Ok(receipt)
    }

    /// Wait until the replica reflects `serial` under `epoch`.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_for_serial(&self, epoch: Epoch, serial: Serial, timeout: Duration) -> bool {
        let mut progress = self.shared.progress.subscribe();
        let reached = progress.wait_for(|(e, s)| *e == epoch && *s >= serial);
        let reached = matches!(tokio::time::timeout(timeout, reached).await, Ok(Ok(_)));
        reached
    }

    /// Whether the reconciler is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let tasks = self.shared.tasks.lock();
        !tasks.is_empty() && tasks.iter().all(|task| !task.is_finished())
    }

    /// Wait for the reconciler to stop. It stops on shutdown.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.shared.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(kind = %R::KIND, symbol = %self.shared.symbol, error = %e, "Replica task failed");
            }
        }
    }
}

async fn initial_snapshot<R: Record>(
    symbol: &Symbol,
    authority: &dyn AuthorityApi<R>,
    config: &ReplicationConfig,
) -> Result<Diff<R>> {
    let attempts = config.load_retry_attempts.max(1);
    let mut backoff = Backoff::new(&config.retry);
    loop {
        match authority.snapshot(symbol).await {
            Ok(diff) => return Ok(diff),
            Err(e) if backoff.failures() + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    kind = %R::KIND,
                    symbol = %symbol,
                    attempt = backoff.failures(),
                    error = %e,
                    "Replica activation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
