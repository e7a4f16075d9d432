//! Provider facade: the read/write surface trading workers call.
//!
//! Reads come from the local replica. Writes go straight to the authority
//! under long-poll, or through the replica under stream so the caller reads
//! its own writes immediately.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::replica::{Replica, ReplicaRegistry};
use crate::domain::{Order, OrderFilter, OrderId, OrderSide, Record, Symbol, Trade};
use crate::error::Result;
use crate::infrastructure::config::Transport;
use crate::port::inbound::RecordProvider;

/// Records of one kind for every symbol this locality reads.
pub struct Provider<R: Record> {
    replicas: Arc<ReplicaRegistry<R>>,
}

impl<R: Record> Clone for Provider<R> {
    fn clone(&self) -> Self {
        Self {
            replicas: Arc::clone(&self.replicas),
        }
    }
}

impl<R: Record> Provider<R> {
    #[must_use]
    pub fn new(replicas: Arc<ReplicaRegistry<R>>) -> Self {
        Self { replicas }
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.replicas.transport()
    }

    #[must_use]
    pub fn replicas(&self) -> &Arc<ReplicaRegistry<R>> {
        &self.replicas
    }

    pub async fn replica(&self, symbol: &Symbol) -> Result<Replica<R>> {
        self.replicas.replica(symbol).await
    }

    /// Activate replicas ahead of the first read.
    ///
    /// # Errors
    ///
    /// Stops at the first symbol whose replica cannot be activated.
    pub async fn warm_up(&self, symbols: &[Symbol]) -> Result<()> {
        for symbol in symbols {
            let replica = self.replicas.replica(symbol).await?;
            info!(
                kind = %R::KIND,
                symbol = %symbol,
                records = replica.view().len(),
                "Provider warmed up"
            );
        }
        Ok(())
    }

    /// Records of `symbol` matching `predicate`, ordered by identity.
    pub async fn filtered(&self, symbol: &Symbol, predicate: impl Fn(&R) -> bool + Send) -> Result<Vec<R>> {
        Ok(self.replica(symbol).await?.filtered(predicate))
    }
}

fn group_by_symbol<R: Record>(records: Vec<R>) -> BTreeMap<Symbol, Vec<R>> {
    let mut groups: BTreeMap<Symbol, Vec<R>> = BTreeMap::new();
    for record in records {
        groups.entry(record.symbol().clone()).or_default().push(record);
    }
    groups
}

#[async_trait]
impl<R: Record> RecordProvider<R> for Provider<R> {
    async fn get_records(&self, symbol: &Symbol) -> Result<Vec<R>> {
        Ok(self.replica(symbol).await?.snapshot())
    }

    async fn lookup(&self, symbol: &Symbol, id: R::Id) -> Result<Option<R>> {
        Ok(self.replica(symbol).await?.lookup(&id))
    }

    async fn set_many(&self, records: Vec<R>) -> Result<()> {
        for (symbol, records) in group_by_symbol(records) {
            let count = records.len();
            let receipt = match self.transport() {
                Transport::LongPoll => {
                    self.replicas
                        .authority()
                        .submit_many(&symbol, records)
                        .await?
                }
                Transport::Stream => self.replica(&symbol).await?.submit_many(records).await?,
            };
            debug!(
                kind = %R::KIND,
                symbol = %symbol,
                records = count,
                accepted = receipt.accepted,
                serial = receipt.serial,
                "Records set"
            );
        }
        Ok(())
    }
}

impl Provider<Order> {
    /// Open orders on one side of the book.
    pub async fn open_orders(&self, symbol: &Symbol, side: OrderSide) -> Result<Vec<Order>> {
        self.orders(symbol, OrderFilter::open(side)).await
    }

    /// Closed orders that executed something.
    pub async fn completed_significant(&self, symbol: &Symbol) -> Result<Vec<Order>> {
        self.filtered(symbol, Order::is_completed_significant).await
    }

    pub async fn orders(&self, symbol: &Symbol, filter: OrderFilter) -> Result<Vec<Order>> {
        self.filtered(symbol, |order| filter.matches(order)).await
    }

    /// Lowest order id among orders matching `filter`.
    pub async fn min_id(&self, symbol: &Symbol, filter: OrderFilter) -> Result<Option<OrderId>> {
        let view = self.replica(symbol).await?.view();
        let id = view.records().iter().find(|o| filter.matches(o)).map(|o| o.id);
        Ok(id)
    }

    /// Highest order id among orders matching `filter`.
    pub async fn max_id(&self, symbol: &Symbol, filter: OrderFilter) -> Result<Option<OrderId>> {
        let view = self.replica(symbol).await?.view();
        let id = view.records().iter().rev().find(|o| filter.matches(o)).map(|o| o.id);
        Ok(id)
    }
}

impl Provider<Trade> {
    pub async fn trades_for_order(&self, symbol: &Symbol, order_id: OrderId) -> Result<Vec<Trade>> {
        self.filtered(symbol, |trade| trade.order_id == order_id).await
    }

    /// Most recent trade by execution time; ties go to the higher id.
    pub async fn last_trade(&self, symbol: &Symbol) -> Result<Option<Trade>> {
        let view = self.replica(symbol).await?.view();
        let last = view
            .records()
            .iter()
            .max_by(|a, b| a.time.cmp(&b.time).then(a.id.cmp(&b.id)))
            .cloned();
        Ok(last)
    }
}
