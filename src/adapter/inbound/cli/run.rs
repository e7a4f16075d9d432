//! Handler for the `run` command.
//!
//! Wires the SQLite store, one authority registry and one replica registry
//! per record kind, activates the configured symbols and keeps them running
//! until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::outbound::sqlite::database::connection;
use crate::adapter::outbound::sqlite::SqliteRecordStore;
use crate::application::{AuthorityRegistry, Provider, ReplicaRegistry};
use crate::domain::{Order, Record, Trade};
use crate::error::Result;
use crate::infrastructure::config::{Config, ReplicationConfig, Transport};
use crate::infrastructure::{shutdown_channel, BroadcastHub, ShutdownSignal};
use crate::port::outbound::{AuthorityApi, RecordStore};

/// Authority and replica registries for one record kind.
struct Lane<R: Record> {
    authorities: Arc<AuthorityRegistry<R, SqliteRecordStore>>,
    provider: Provider<R>,
}

impl<R: Record> Lane<R>
where
    SqliteRecordStore: RecordStore<R>,
{
    fn new(store: &Arc<SqliteRecordStore>, config: &ReplicationConfig, shutdown: &ShutdownSignal) -> Self {
        let registry = AuthorityRegistry::new(Arc::clone(store), config.clone(), shutdown.clone());
        let (authorities, replicas) = match config.transport {
            Transport::LongPoll => {
                let authorities = Arc::new(registry);
                let api: Arc<dyn AuthorityApi<R>> = authorities.clone();
                let replicas = ReplicaRegistry::long_poll(api, config.clone(), shutdown.clone());
                (authorities, replicas)
            }
            Transport::Stream => {
                let hub: Arc<BroadcastHub<R>> = Arc::new(BroadcastHub::new(config.broadcast_capacity));
                let authorities = Arc::new(registry.with_feed(hub.clone()));
                let api: Arc<dyn AuthorityApi<R>> = authorities.clone();
                let replicas = ReplicaRegistry::stream(api, hub, config.clone(), shutdown.clone());
                (authorities, replicas)
            }
        };
        Self {
            authorities,
            provider: Provider::new(Arc::new(replicas)),
        }
    }

    async fn log_stats(&self) {
        for stats in self.authorities.stats().await {
            info!(
                kind = %stats.kind,
                symbol = %stats.symbol,
                epoch = %stats.epoch,
                serial = stats.max_serial,
                saved = stats.saved_serial,
                records = stats.records,
                waiters = stats.waiters,
                persisting = stats.persisting,
                "Authority stats"
            );
        }
    }

    async fn stop(&self) {
        self.provider.replicas().shutdown().await;
        self.authorities.shutdown().await;
    }
}

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let config = Config::load(&args.config.config)?;
    config.init_logging();
    info!(
        database = %config.database.url,
        transport = config.replication.transport.as_str(),
        symbols = config.replication.symbols.len(),
        "tradesync starting"
    );

    let store = Arc::new(SqliteRecordStore::new(connection::open(&config.database.url)?));
    let (trigger, shutdown) = shutdown_channel();
    let orders: Lane<Order> = Lane::new(&store, &config.replication, &shutdown);
    let trades: Lane<Trade> = Lane::new(&store, &config.replication, &shutdown);

    let symbols = &config.replication.symbols;
    orders.provider.warm_up(symbols).await?;
    trades.provider.warm_up(symbols).await?;

    let mut stats = tokio::time::interval(Duration::from_secs(args.stats_interval.max(1)));
    stats.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
                }
                info!("Shutdown signal received");
                break;
            }
            _ = stats.tick() => {
                orders.log_stats().await;
                trades.log_stats().await;
            }
        }
    }

    trigger.trigger();
    orders.stop().await;
    trades.stop().await;
    info!("tradesync stopped");
    Ok(())
}
