//! Per-locality replica registry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::info;

use super::{Replica, ReplicaMode};
use crate::domain::{Record, Symbol};
use crate::error::{ReplicationError, Result};
use crate::infrastructure::config::{ReplicationConfig, Transport};
use crate::infrastructure::ShutdownSignal;
use crate::port::outbound::{AuthorityApi, RecordFeed};

/// Replicas of one record kind, activated lazily per symbol.
pub struct ReplicaRegistry<R: Record> {
    authority: Arc<dyn AuthorityApi<R>>,
    mode: ReplicaMode<R>,
    config: ReplicationConfig,
    shutdown: ShutdownSignal,
    slots: DashMap<Symbol, Arc<OnceCell<Replica<R>>>>,
}

impl<R: Record> ReplicaRegistry<R> {
    /// Replicas that long-poll the authority for diffs.
    #[must_use]
    pub fn long_poll(
        authority: Arc<dyn AuthorityApi<R>>,
        config: ReplicationConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self::new(authority, ReplicaMode::LongPoll, config, shutdown)
    }

    /// Replicas that follow the broadcast feed.
    #[must_use]
    pub fn stream(
        authority: Arc<dyn AuthorityApi<R>>,
        feed: Arc<dyn RecordFeed<R>>,
        config: ReplicationConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self::new(authority, ReplicaMode::Stream(feed), config, shutdown)
    }

    #[must_use]
    pub fn new(
        authority: Arc<dyn AuthorityApi<R>>,
        mode: ReplicaMode<R>,
        config: ReplicationConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            authority,
            mode,
            config,
            shutdown,
            slots: DashMap::new(),
        }
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.mode.transport()
    }

    #[must_use]
    pub fn authority(&self) -> &Arc<dyn AuthorityApi<R>> {
        &self.authority
    }

    /// The replica for `symbol`, activating it on first use.
    ///
    /// # Errors
    ///
    /// Fails if activation cannot load a snapshot or the registry is
    /// shutting down.
    pub async fn replica(&self, symbol: &Symbol) -> Result<Replica<R>> {
        if self.shutdown.is_triggered() {
            return Err(ReplicationError::ReplicaUnavailable {
                kind: R::KIND,
                symbol: symbol.clone(),
            }
            .into());
        }
        let slot = Arc::clone(&self.slots.entry(symbol.clone()).or_default());
        let replica = slot
            .get_or_try_init(|| {
                Replica::activate(
                    symbol.clone(),
                    Arc::clone(&self.authority),
                    self.mode.clone(),
                    &self.config,
                    self.shutdown.clone(),
                )
            })
            .await?;
        Ok(replica.clone())
    }

    /// Active replicas ordered by symbol.
    #[must_use]
    pub fn active(&self) -> Vec<Replica<R>> {
        let mut replicas: Vec<Replica<R>> = self
            .slots
            .iter()
            .filter_map(|slot| slot.value().get().cloned())
            .collect();
        replicas.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        replicas
    }

    /// Wait for every reconciler to stop. Trigger the shutdown signal first.
    pub async fn shutdown(&self) {
        let replicas = self.active();
        self.slots.clear();
        for replica in &replicas {
            replica.join().await;
        }
        info!(kind = %R::KIND, replicas = replicas.len(), "Replicas stopped");
    }
}
