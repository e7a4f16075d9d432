//! Record store double that records calls and fails on demand.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::adapter::outbound::memory::MemoryRecordStore;
use crate::domain::{Record, Symbol};
use crate::error::{Error, Result};
use crate::port::outbound::RecordStore;

/// Wraps a [`MemoryRecordStore`] and keeps a log of what reached it.
///
/// `save_calls` counts every attempt; `saved_batches` only holds batches
/// that were actually stored.
pub struct RecordingStore<R: Record> {
    inner: MemoryRecordStore<R>,
    saved: Mutex<Vec<Vec<R>>>,
    save_calls: AtomicUsize,
    load_calls: AtomicUsize,
    failing_saves: AtomicBool,
    failing_loads: AtomicU32,
    save_delay_ms: AtomicU64,
}

impl<R: Record> RecordingStore<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Store pre-populated with `records`, as if saved by an earlier run.
    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            inner: MemoryRecordStore::with_records(records),
            saved: Mutex::new(Vec::new()),
            save_calls: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            failing_saves: AtomicBool::new(false),
            failing_loads: AtomicU32::new(0),
            save_delay_ms: AtomicU64::new(0),
        }
    }

    /// Make every save fail until switched off again.
    pub fn fail_saves(&self, fail: bool) {
        self.failing_saves.store(fail, Ordering::SeqCst);
    }

    /// Make the next `n` loads fail.
    pub fn fail_loads(&self, n: u32) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// Hold every save for `delay` before storing.
    pub fn slow_saves(&self, delay: Duration) {
        self.save_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn saved_batches(&self) -> Vec<Vec<R>> {
        self.saved.lock().clone()
    }

    /// Current stored rows of a symbol ordered by identity.
    pub fn stored(&self, symbol: &Symbol) -> Vec<R> {
        self.inner.records(symbol)
    }
}

impl<R: Record> Default for RecordingStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> RecordStore<R> for RecordingStore<R> {
    async fn load_all(&self, symbol: &Symbol) -> Result<Vec<R>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::Connection(format!("scripted load failure for {symbol}")));
        }
        self.inner.load_all(symbol).await
    }

    async fn save_many(&self, records: &[R]) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.save_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing_saves.load(Ordering::SeqCst) {
            return Err(Error::Database("scripted save failure".into()));
        }
        self.inner.save_many(records).await?;
        self.saved.lock().push(records.to_vec());
        Ok(())
    }
}
