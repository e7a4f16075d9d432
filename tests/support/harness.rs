//! Wiring shared by the replication tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tradesync::adapter::outbound::memory::MemoryRecordStore;
use tradesync::application::{AuthorityRegistry, Provider, ReplicaRegistry};
use tradesync::domain::{Order, Symbol};
use tradesync::infrastructure::{shutdown_channel, BroadcastHub, ShutdownSignal, ShutdownTrigger};
use tradesync::port::outbound::AuthorityApi;
use tradesync::testkit::config;

pub const WAIT: Duration = Duration::from_secs(3);

pub type OrderAuthority = AuthorityRegistry<Order, MemoryRecordStore<Order>>;

pub fn btc() -> Symbol {
    Symbol::new("BTCUSDT")
}

/// One authority registry over a memory store plus a shutdown switch.
pub struct Cluster {
    pub store: Arc<MemoryRecordStore<Order>>,
    pub authority: Arc<OrderAuthority>,
    pub hub: Arc<BroadcastHub<Order>>,
    pub trigger: ShutdownTrigger,
    pub shutdown: ShutdownSignal,
}

impl Cluster {
    pub fn new() -> Self {
        Self::with_store(MemoryRecordStore::new())
    }

    pub fn with_store(store: MemoryRecordStore<Order>) -> Self {
        let store = Arc::new(store);
        let (trigger, shutdown) = shutdown_channel();
        let hub: Arc<BroadcastHub<Order>> = Arc::new(BroadcastHub::new(256));
        let authority = Arc::new(
            AuthorityRegistry::new(Arc::clone(&store), config::replication(), shutdown.clone())
                .with_feed(hub.clone()),
        );
        Self {
            store,
            authority,
            hub,
            trigger,
            shutdown,
        }
    }

    pub fn api(&self) -> Arc<dyn AuthorityApi<Order>> {
        self.authority.clone()
    }

    /// A locality reading through long-poll replicas.
    pub fn long_poll_provider(&self) -> Provider<Order> {
        Provider::new(Arc::new(ReplicaRegistry::long_poll(
            self.api(),
            config::replication(),
            self.shutdown.clone(),
        )))
    }

    /// A locality reading through stream replicas.
    pub fn stream_provider(&self) -> Provider<Order> {
        Provider::new(Arc::new(ReplicaRegistry::stream(
            self.api(),
            self.hub.clone(),
            config::streaming(),
            self.shutdown.clone(),
        )))
    }

    pub async fn stop(&self) {
        self.trigger.trigger();
        self.authority.shutdown().await;
    }
}

/// Poll `check` until it holds or [`WAIT`] elapses.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
