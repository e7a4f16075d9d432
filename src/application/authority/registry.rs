//! Symbol → authority mapping with lazy activation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::actor::{spawn_authority, AuthorityHandle, AuthorityStats};
use crate::domain::{Diff, Epoch, Receipt, Record, Serial, Symbol};
use crate::error::{ReplicationError, Result};
use crate::infrastructure::config::ReplicationConfig;
use crate::infrastructure::ShutdownSignal;
use crate::port::outbound::{AuthorityApi, RecordFeed, RecordStore};

type Slot<R> = Arc<OnceCell<AuthorityHandle<R>>>;

/// Owns the authorities of one record kind.
///
/// The first request for a symbol loads it from the store and starts its
/// actor; concurrent first requests share that single activation. An actor
/// that stopped (after index corruption, for instance) is replaced on the
/// next request, reloading from the store under a new epoch.
pub struct AuthorityRegistry<R: Record, S> {
    store: Arc<S>,
    feed: Option<Arc<dyn RecordFeed<R>>>,
    config: ReplicationConfig,
    shutdown: ShutdownSignal,
    slots: DashMap<Symbol, Slot<R>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<R, S> AuthorityRegistry<R, S>
where
    R: Record,
    S: RecordStore<R>,
{
    #[must_use]
    pub fn new(store: Arc<S>, config: ReplicationConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            store,
            feed: None,
            config,
            shutdown,
            slots: DashMap::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Publish every accepted record on `feed`.
    #[must_use]
    pub fn with_feed(mut self, feed: Arc<dyn RecordFeed<R>>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Handle of the authority for `symbol`, starting it if needed.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be loaded within the retry budget or the
    /// registry is shutting down.
    pub async fn handle(&self, symbol: &Symbol) -> Result<AuthorityHandle<R>> {
        for _ in 0..2 {
            if self.shutdown.is_triggered() {
                break;
            }
            let slot = Arc::clone(&self.slots.entry(symbol.clone()).or_default());
            let handle = slot
                .get_or_try_init(|| self.activate(symbol.clone()))
                .await?;
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
            warn!(kind = %R::KIND, symbol = %symbol, "Authority stopped, reactivating");
            self.slots
                .remove_if(symbol, |_, current| Arc::ptr_eq(current, &slot));
        }
        Err(ReplicationError::AuthorityUnavailable {
            kind: R::KIND,
            symbol: symbol.clone(),
        }
        .into())
    }

    /// Symbols with a started authority.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .map(|slot| slot.key().clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Stats of every running authority, ordered by symbol.
    pub async fn stats(&self) -> Vec<AuthorityStats> {
        let handles: Vec<AuthorityHandle<R>> = self
            .slots
            .iter()
            .filter_map(|slot| slot.value().get().cloned())
            .collect();
        let mut stats = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(s) = handle.stats().await {
                stats.push(s);
            }
        }
        stats.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        stats
    }

    /// Persist every authority's accepted changes now.
    pub async fn flush_all(&self) {
        let handles: Vec<AuthorityHandle<R>> = self
            .slots
            .iter()
            .filter_map(|slot| slot.value().get().cloned())
            .collect();
        for handle in handles {
            if let Err(e) = handle.flush().await {
                warn!(kind = %R::KIND, symbol = %handle.symbol(), error = %e, "Flush failed");
            }
        }
    }

    /// Drop every handle and wait for the actors to finish their final
    /// flush. Callers usually trigger the shutdown signal first.
    pub async fn shutdown(&self) {
        self.slots.clear();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(kind = %R::KIND, error = %e, "Authority task panicked");
            }
        }
        info!(kind = %R::KIND, authorities = count, "Authorities stopped");
    }

    async fn activate(&self, symbol: Symbol) -> Result<AuthorityHandle<R>> {
        let (handle, task) = spawn_authority(
            symbol,
            Arc::clone(&self.store),
            self.feed.clone(),
            &self.config,
            self.shutdown.clone(),
        )
        .await?;
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
        Ok(handle)
    }
}

#[async_trait]
impl<R, S> AuthorityApi<R> for AuthorityRegistry<R, S>
where
    R: Record,
    S: RecordStore<R>,
{
    async fn submit_many(&self, symbol: &Symbol, records: Vec<R>) -> Result<Receipt> {
        self.handle(symbol).await?.submit_many(records).await
    }

    async fn snapshot(&self, symbol: &Symbol) -> Result<Diff<R>> {
        self.handle(symbol).await?.snapshot().await
    }

    async fn diff_since(
        &self,
        symbol: &Symbol,
        epoch: Epoch,
        from: Serial,
        wait: Duration,
    ) -> Result<Diff<R>> {
        self.handle(symbol)
            .await?
            .diff_since(epoch, from, wait)
            .await
    }

    async fn lookup(&self, symbol: &Symbol, id: R::Id) -> Result<Option<R>> {
        self.handle(symbol).await?.lookup(id).await
    }
}
