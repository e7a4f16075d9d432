//! End-to-end replication behavior across authorities, replicas and the
//! provider facade.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use support::harness::{btc, Cluster, OrderAuthority, WAIT};
use tradesync::adapter::outbound::memory::MemoryRecordStore;
use tradesync::application::{ingest_channel, AuthorityRegistry, ReplicaRegistry};
use tradesync::domain::{Diff, Epoch, Order, OrderId, OrderSide, OrderStatus, Receipt, RecordSet, Serial, Symbol};
use tradesync::error::Result;
use tradesync::infrastructure::config::ReplicationConfig;
use tradesync::infrastructure::ShutdownSignal;
use tradesync::port::inbound::RecordProvider;
use tradesync::port::outbound::{AuthorityApi, RecordStore};
use tradesync::testkit::config;
use tradesync::testkit::domain::{order, ts};
use tradesync::testkit::store::RecordingStore;

#[tokio::test]
async fn order_lifecycle_reaches_replica_and_store() {
    let store = Arc::new(RecordingStore::<Order>::new());
    let slow_persist = ReplicationConfig {
        persist_interval_ms: 60_000,
        ..config::replication()
    };
    let authority = Arc::new(AuthorityRegistry::new(
        Arc::clone(&store),
        slow_persist.clone(),
        ShutdownSignal::never(),
    ));
    let symbol = Symbol::new("X");

    authority
        .submit(&symbol, order(1).symbol("X").status(OrderStatus::New).updated(ts(1)).build())
        .await
        .unwrap();

    let replicas = ReplicaRegistry::long_poll(authority.clone(), slow_persist, ShutdownSignal::never());
    let replica = replicas.replica(&symbol).await.unwrap();
    let seen = replica.snapshot();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, OrderStatus::New);

    let receipt = authority
        .submit(&symbol, order(1).symbol("X").status(OrderStatus::Filled).updated(ts(2)).build())
        .await
        .unwrap();
    assert!(replica.wait_for_serial(receipt.epoch, receipt.serial, WAIT).await);
    let seen = replica.snapshot();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, OrderStatus::Filled);

    authority.flush_all().await;
    assert_eq!(store.save_calls(), 1);
    let batches = store.saved_batches();
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].status, OrderStatus::Filled);
}

#[tokio::test]
async fn last_write_wins_in_either_order() {
    let cluster = Cluster::new();
    let older = order(1).status(OrderStatus::New).updated(ts(1)).build();
    let newer = order(1).status(OrderStatus::Canceled).updated(ts(2)).build();

    cluster.authority.submit(&btc(), newer.clone()).await.unwrap();
    cluster.authority.submit(&btc(), older.clone()).await.unwrap();
    let other = Symbol::new("ETHUSDT");
    let older_eth = order(1).symbol("ETHUSDT").status(OrderStatus::New).updated(ts(1)).build();
    let newer_eth = order(1).symbol("ETHUSDT").status(OrderStatus::Canceled).updated(ts(2)).build();
    cluster
        .authority
        .submit_many(&other, vec![older_eth, newer_eth])
        .await
        .unwrap();

    let first = cluster.authority.lookup(&btc(), OrderId::new(1)).await.unwrap().unwrap();
    let second = cluster.authority.lookup(&other, OrderId::new(1)).await.unwrap().unwrap();
    assert_eq!(first.status, OrderStatus::Canceled);
    assert_eq!(second.status, OrderStatus::Canceled);
}

#[tokio::test]
async fn serials_are_dense_across_accepted_writes() {
    let cluster = Cluster::new();
    let mut last = 0;
    for id in 1..=20u64 {
        let receipt = cluster
            .authority
            .submit(&btc(), order(id % 7).updated(ts(id as i64)).build())
            .await
            .unwrap();
        assert_eq!(receipt.accepted, 1);
        assert_eq!(receipt.serial, last + 1);
        last = receipt.serial;
    }
    // A stale write does not consume a serial.
    let stale = cluster
        .authority
        .submit(&btc(), order(1).updated(ts(0)).build())
        .await
        .unwrap();
    assert_eq!(stale.accepted, 0);
    assert_eq!(stale.serial, last);
}

#[tokio::test]
async fn diff_applied_to_older_snapshot_matches_current_state() {
    let cluster = Cluster::new();
    for id in 1..=4 {
        cluster.authority.submit(&btc(), order(id).build()).await.unwrap();
    }
    let before = cluster.authority.snapshot(&btc()).await.unwrap();

    cluster
        .authority
        .submit(&btc(), order(2).status(OrderStatus::Filled).updated(ts(9)).build())
        .await
        .unwrap();
    cluster.authority.submit(&btc(), order(5).build()).await.unwrap();

    let diff = cluster
        .authority
        .diff_since(&btc(), before.epoch, before.max_serial + 1, Duration::ZERO)
        .await
        .unwrap();
    assert!(!diff.full);
    assert_eq!(diff.records.len(), 2);

    let mut rebuilt = RecordSet::from_records(before.records);
    for record in diff.records {
        rebuilt.apply(record);
    }
    let after = cluster.authority.snapshot(&btc()).await.unwrap();
    assert_eq!(diff.max_serial, after.max_serial);
    assert_eq!(rebuilt.to_vec(), after.records);
}

#[tokio::test]
async fn stale_epoch_gets_a_full_snapshot() {
    let cluster = Cluster::new();
    cluster.authority.submit(&btc(), order(1).build()).await.unwrap();
    cluster.authority.submit(&btc(), order(2).build()).await.unwrap();

    let diff = cluster
        .authority
        .diff_since(&btc(), Epoch::generate(), 2, Duration::ZERO)
        .await
        .unwrap();

    assert!(diff.full);
    assert_eq!(diff.records.len(), 2);
    assert_eq!(diff.max_serial, 2);
}

#[tokio::test]
async fn long_poll_is_held_until_a_write_arrives() {
    let cluster = Cluster::new();
    let snapshot = cluster.authority.snapshot(&btc()).await.unwrap();

    let authority = cluster.authority.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        authority.submit(&btc(), order(1).build()).await.unwrap();
    });

    let started = tokio::time::Instant::now();
    let diff = cluster
        .authority
        .diff_since(&btc(), snapshot.epoch, 1, Duration::from_secs(5))
        .await
        .unwrap();
    writer.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(diff.records.len(), 1);
    assert_eq!(diff.max_serial, 1);
}

#[tokio::test]
async fn long_poll_timeout_answers_empty_at_the_watermark() {
    let cluster = Cluster::new();
    cluster.authority.submit(&btc(), order(1).build()).await.unwrap();
    let snapshot = cluster.authority.snapshot(&btc()).await.unwrap();

    let diff = cluster
        .authority
        .diff_since(&btc(), snapshot.epoch, 2, Duration::from_millis(30))
        .await
        .unwrap();

    assert!(diff.is_empty());
    assert_eq!(diff.epoch, snapshot.epoch);
    assert_eq!(diff.max_serial, 1);
}

async fn converge(cluster: &Cluster, providers: &[tradesync::application::Provider<Order>]) {
    for provider in providers {
        provider.warm_up(&[btc()]).await.unwrap();
    }

    let mut writers = Vec::new();
    for worker in 0..4u64 {
        let authority = cluster.authority.clone();
        writers.push(tokio::spawn(async move {
            for step in 0..25u64 {
                let id = worker * 100 + step % 10;
                let record = order(id)
                    .side(if worker % 2 == 0 { OrderSide::Buy } else { OrderSide::Sell })
                    .updated(ts(step as i64))
                    .build();
                authority.submit(&btc(), record).await.unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    let expected = cluster.authority.snapshot(&btc()).await.unwrap();
    for provider in providers {
        let replica = provider.replica(&btc()).await.unwrap();
        assert!(
            replica
                .wait_for_serial(expected.epoch, expected.max_serial, WAIT)
                .await,
            "replica stuck at {}",
            replica.serial()
        );
        assert_eq!(provider.get_records(&btc()).await.unwrap(), expected.records);
    }
}

#[tokio::test]
async fn long_poll_replicas_converge_under_concurrent_writes() {
    let cluster = Cluster::new();
    let providers = vec![cluster.long_poll_provider(), cluster.long_poll_provider()];
    converge(&cluster, &providers).await;
}

#[tokio::test]
async fn stream_replicas_converge_under_concurrent_writes() {
    let cluster = Cluster::new();
    let providers = vec![cluster.stream_provider(), cluster.stream_provider()];
    converge(&cluster, &providers).await;
}

#[tokio::test]
async fn stream_provider_reads_its_own_writes() {
    let cluster = Cluster::new();
    let provider = cluster.stream_provider();
    provider.warm_up(&[btc()]).await.unwrap();

    provider
        .set_record(order(3).side(OrderSide::Sell).build())
        .await
        .unwrap();

    let open = provider.open_orders(&btc(), OrderSide::Sell).await.unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn authority_restart_reloads_from_the_store() {
    let cluster = Cluster::new();
    cluster.authority.submit(&btc(), order(1).build()).await.unwrap();
    cluster.authority.submit(&btc(), order(2).build()).await.unwrap();
    let first_epoch = cluster.authority.snapshot(&btc()).await.unwrap().epoch;
    cluster.stop().await;

    let restarted = Cluster::with_store(MemoryRecordStore::with_records(
        cluster.store.records(&btc()),
    ));
    let snapshot = restarted.authority.snapshot(&btc()).await.unwrap();

    assert_ne!(snapshot.epoch, first_epoch);
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(snapshot.max_serial, 2);
}

/// Delegates to whichever authority is current, so a test can swap in a
/// restarted one underneath a running replica.
struct Switchable {
    current: RwLock<Arc<OrderAuthority>>,
}

impl Switchable {
    fn get(&self) -> Arc<OrderAuthority> {
        Arc::clone(&self.current.read())
    }
}

#[async_trait]
impl AuthorityApi<Order> for Switchable {
    async fn submit_many(&self, symbol: &Symbol, records: Vec<Order>) -> Result<Receipt> {
        self.get().submit_many(symbol, records).await
    }

    async fn snapshot(&self, symbol: &Symbol) -> Result<Diff<Order>> {
        self.get().snapshot(symbol).await
    }

    async fn diff_since(
        &self,
        symbol: &Symbol,
        epoch: Epoch,
        from: Serial,
        wait: Duration,
    ) -> Result<Diff<Order>> {
        self.get().diff_since(symbol, epoch, from, wait).await
    }

    async fn lookup(&self, symbol: &Symbol, id: OrderId) -> Result<Option<Order>> {
        self.get().lookup(symbol, id).await
    }
}

#[tokio::test]
async fn replica_resynchronizes_after_epoch_change() {
    let first = Cluster::new();
    let switch = Arc::new(Switchable {
        current: RwLock::new(first.authority.clone()),
    });
    let replicas = ReplicaRegistry::long_poll(switch.clone(), config::replication(), ShutdownSignal::never());
    let replica = replicas.replica(&btc()).await.unwrap();

    let receipt = switch.submit(&btc(), order(1).build()).await.unwrap();
    assert!(replica.wait_for_serial(receipt.epoch, receipt.serial, WAIT).await);
    first.authority.flush_all().await;

    let second = Cluster::with_store(MemoryRecordStore::with_records(first.store.records(&btc())));
    *switch.current.write() = second.authority.clone();
    let receipt = switch.submit(&btc(), order(2).build()).await.unwrap();
    assert_ne!(receipt.epoch, first.authority.snapshot(&btc()).await.unwrap().epoch);

    assert!(replica.wait_for_serial(receipt.epoch, receipt.serial, WAIT).await);
    let ids: Vec<u64> = replica.snapshot().iter().map(|o| o.id.value()).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn ingest_pump_conflates_bursts_into_the_authority() {
    let cluster = Cluster::new();
    let (sink, pump) = ingest_channel(cluster.api(), config::retry());
    let pump = tokio::spawn(pump.run(cluster.shutdown.clone()));

    for step in 0..50 {
        sink.write(order(1).executed(rust_decimal::Decimal::from(step)).updated(ts(step)).build())
            .unwrap();
    }
    drop(sink);
    let stats = pump.await.unwrap();

    assert!(stats.submitted <= 50);
    let current = cluster.authority.lookup(&btc(), OrderId::new(1)).await.unwrap().unwrap();
    assert_eq!(current.updated_at, ts(49));
}

#[tokio::test]
async fn shutdown_flushes_unsaved_changes() {
    let store = Arc::new(RecordingStore::<Order>::new());
    let config = ReplicationConfig {
        persist_interval_ms: 60_000,
        ..config::replication()
    };
    let (trigger, signal) = tradesync::infrastructure::shutdown_channel();
    let authority = AuthorityRegistry::new(Arc::clone(&store), config, signal);

    for id in 1..=3 {
        authority.submit(&btc(), order(id).build()).await.unwrap();
    }
    trigger.trigger();
    authority.shutdown().await;

    let stored: Vec<Order> = store.load_all(&btc()).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(authority.submit(&btc(), order(9).build()).await.is_err());
}
