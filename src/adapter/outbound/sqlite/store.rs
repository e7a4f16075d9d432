//! SQLite record store implementation.
//!
//! Persists orders and trades keyed by `(symbol, id)`. Saving replaces rows
//! by identity, so retried batches never duplicate anything.

use diesel::prelude::*;

use crate::adapter::outbound::sqlite::database::connection::DbPool;
use crate::adapter::outbound::sqlite::database::model::{OrderRow, TradeRow};
use crate::adapter::outbound::sqlite::database::schema::{orders, trades};
use crate::domain::{Order, Symbol, Trade};
use crate::error::{Error, Result};
use crate::port::outbound::RecordStore;

/// SQLite-backed storage for orders and trades.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: DbPool,
}

impl SqliteRecordStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Every symbol with at least one stored order or trade.
    pub async fn symbols(&self) -> Result<Vec<Symbol>> {
        self.blocking(|conn| {
            let mut names: Vec<String> = orders::table
                .select(orders::symbol)
                .distinct()
                .load(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            let traded: Vec<String> = trades::table
                .select(trades::symbol)
                .distinct()
                .load(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            names.extend(traded);
            names.sort();
            names.dedup();
            Ok(names.into_iter().map(Symbol::new).collect())
        })
        .await
    }

    /// Run a closure against a pooled connection off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Database(format!("storage task failed: {e}")))?
    }
}

impl RecordStore<Order> for SqliteRecordStore {
    async fn load_all(&self, symbol: &Symbol) -> Result<Vec<Order>> {
        let symbol = symbol.as_str().to_string();
        let rows = self
            .blocking(move |conn| {
                orders::table
                    .filter(orders::symbol.eq(symbol))
                    .order(orders::id.asc())
                    .select(OrderRow::as_select())
                    .load(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })
            .await?;
        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn save_many(&self, records: &[Order]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let rows = records
            .iter()
            .map(OrderRow::from_order)
            .collect::<Result<Vec<_>>>()?;
        self.blocking(move |conn| {
            conn.transaction(|conn| {
                for row in &rows {
                    diesel::replace_into(orders::table).values(row).execute(conn)?;
                }
                Ok::<_, diesel::result::Error>(())
            })
            .map_err(|e| Error::Database(e.to_string()))
        })
        .await
    }
}

impl RecordStore<Trade> for SqliteRecordStore {
    async fn load_all(&self, symbol: &Symbol) -> Result<Vec<Trade>> {
        let symbol = symbol.as_str().to_string();
        let rows = self
            .blocking(move |conn| {
                trades::table
                    .filter(trades::symbol.eq(symbol))
                    .order(trades::id.asc())
                    .select(TradeRow::as_select())
                    .load(conn)
                    .map_err(|e| Error::Database(e.to_string()))
            })
            .await?;
        rows.into_iter().map(TradeRow::into_trade).collect()
    }

    async fn save_many(&self, records: &[Trade]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let rows = records
            .iter()
            .map(TradeRow::from_trade)
            .collect::<Result<Vec<_>>>()?;
        self.blocking(move |conn| {
            conn.transaction(|conn| {
                for row in &rows {
                    diesel::replace_into(trades::table).values(row).execute(conn)?;
                }
                Ok::<_, diesel::result::Error>(())
            })
            .map_err(|e| Error::Database(e.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::outbound::sqlite::database::connection::open;
    use crate::domain::OrderStatus;
    use crate::testkit::domain::{order, trade, ts};

    fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(open(":memory:").unwrap())
    }

    #[tokio::test]
    async fn save_then_load_orders_per_symbol() {
        let store = store();
        let btc = order(2).build();
        let eth = order(1).symbol("ETHUSDT").build();
        store.save_many(&[btc.clone(), eth.clone()]).await.unwrap();

        let loaded: Vec<Order> = RecordStore::<Order>::load_all(&store, &Symbol::new("BTCUSDT"))
            .await
            .unwrap();
        assert_eq!(loaded, vec![btc]);
        let loaded: Vec<Order> = RecordStore::<Order>::load_all(&store, &Symbol::new("ETHUSDT"))
            .await
            .unwrap();
        assert_eq!(loaded, vec![eth]);
    }

    #[tokio::test]
    async fn saving_again_replaces_by_identity() {
        let store = store();
        let first = order(5).status(OrderStatus::New).updated(ts(1)).build();
        let second = order(5).status(OrderStatus::Filled).updated(ts(2)).build();
        store.save_many(&[first]).await.unwrap();
        store.save_many(&[second.clone()]).await.unwrap();
        store.save_many(&[second.clone()]).await.unwrap();

        let loaded: Vec<Order> = RecordStore::<Order>::load_all(&store, &Symbol::new("BTCUSDT"))
            .await
            .unwrap();
        assert_eq!(loaded, vec![second]);
    }

    #[tokio::test]
    async fn orders_and_trades_are_stored_apart() {
        let store = store();
        store.save_many(&[order(1).build()]).await.unwrap();
        store.save_many(&[trade(1).order(1).build(), trade(2).order(1).build()]).await.unwrap();

        let orders: Vec<Order> = RecordStore::<Order>::load_all(&store, &Symbol::new("BTCUSDT"))
            .await
            .unwrap();
        let trades: Vec<Trade> = RecordStore::<Trade>::load_all(&store, &Symbol::new("BTCUSDT"))
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(trades.len(), 2);
        assert_eq!(store.symbols().await.unwrap(), vec![Symbol::new("BTCUSDT")]);
    }

    #[tokio::test]
    async fn empty_symbol_loads_nothing() {
        let loaded: Vec<Trade> = RecordStore::<Trade>::load_all(&store(), &Symbol::new("XRPUSDT"))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }
}
