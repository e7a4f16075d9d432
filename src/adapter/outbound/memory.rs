//! In-memory record store.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::domain::{Record, Symbol};
use crate::error::Result;
use crate::port::outbound::RecordStore;

/// Volatile store keyed by symbol and identity. Saving replaces rows
/// unconditionally, as an upsert does.
pub struct MemoryRecordStore<R: Record> {
    rows: RwLock<HashMap<Symbol, BTreeMap<R::Id, R>>>,
}

impl<R: Record> MemoryRecordStore<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = R>) -> Self {
        let store = Self::new();
        store.upsert(records);
        store
    }

    /// Stored rows of a symbol ordered by identity.
    #[must_use]
    pub fn records(&self, symbol: &Symbol) -> Vec<R> {
        self.rows
            .read()
            .get(symbol)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn upsert(&self, records: impl IntoIterator<Item = R>) {
        let mut rows = self.rows.write();
        for record in records {
            rows.entry(record.symbol().clone())
                .or_default()
                .insert(record.id(), record);
        }
    }
}

impl<R: Record> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> RecordStore<R> for MemoryRecordStore<R> {
    async fn load_all(&self, symbol: &Symbol) -> Result<Vec<R>> {
        Ok(self.records(symbol))
    }

    async fn save_many(&self, records: &[R]) -> Result<()> {
        self.upsert(records.iter().cloned());
        Ok(())
    }
}
