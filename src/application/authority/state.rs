//! Actor-private authority state: the record set plus its serial indexes.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Applied, Diff, Epoch, Record, RecordSet, Serial, Symbol};
use crate::error::ReplicationError;

/// Records of one symbol, indexed by identity and by the serial of their
/// latest accepted change.
///
/// Every identity in the set holds exactly one serial, and `by_serial` is
/// the exact inverse of `serial_of`.
pub(crate) struct AuthorityState<R: Record> {
    symbol: Symbol,
    epoch: Epoch,
    records: RecordSet<R>,
    serial_of: HashMap<R::Id, Serial>,
    by_serial: BTreeMap<Serial, R::Id>,
    max_serial: Serial,
}

impl<R: Record> AuthorityState<R> {
    /// Build state from stored records under a fresh epoch. Loaded records
    /// get serials `1..=n` in identity order.
    pub(crate) fn load(symbol: Symbol, stored: Vec<R>) -> Self {
        let records = RecordSet::from_records(stored);
        let mut serial_of = HashMap::with_capacity(records.len());
        let mut by_serial = BTreeMap::new();
        let mut max_serial = 0;
        for record in records.iter() {
            max_serial += 1;
            serial_of.insert(record.id(), max_serial);
            by_serial.insert(max_serial, record.id());
        }

        Self {
            symbol,
            epoch: Epoch::generate(),
            records,
            serial_of,
            by_serial,
            max_serial,
        }
    }

    pub(crate) fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub(crate) fn max_serial(&self) -> Serial {
        self.max_serial
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Apply one record under last-write-wins.
    ///
    /// Returns the serial assigned to an accepted change, `None` for a stale
    /// write, and an error if the indexes disagree with the record set.
    pub(crate) fn submit(&mut self, record: R) -> Result<Option<Serial>, ReplicationError> {
        let id = record.id();
        match self.records.apply(record) {
            Applied::Stale => return Ok(None),
            Applied::Replaced(_) => self.unindex(id)?,
            Applied::Inserted => {
                if self.serial_of.contains_key(&id) {
                    return Err(self.corrupted(format!("new record {id} already indexed")));
                }
            }
        }

        self.max_serial += 1;
        self.serial_of.insert(id, self.max_serial);
        self.by_serial.insert(self.max_serial, id);
        Ok(Some(self.max_serial))
    }

    pub(crate) fn snapshot(&self) -> Diff<R> {
        Diff::full(self.epoch, self.max_serial, self.records.to_vec())
    }

    /// Answer a diff request if it can be answered now.
    ///
    /// A foreign epoch gets a full snapshot. `None` means the caller asked
    /// for serials that do not exist yet.
    pub(crate) fn diff_since(&self, epoch: Epoch, from: Serial) -> Option<Diff<R>> {
        if epoch != self.epoch {
            return Some(self.snapshot());
        }
        if from > self.max_serial {
            return None;
        }
        let records = self.collect(from.saturating_sub(1), self.max_serial);
        Some(Diff::incremental(self.epoch, self.max_serial, records))
    }

    /// Current records whose latest change has a serial in `(after, upto]`,
    /// ordered by serial.
    pub(crate) fn collect(&self, after: Serial, upto: Serial) -> Vec<R> {
        if after >= upto {
            return Vec::new();
        }
        self.by_serial
            .range(after + 1..=upto)
            .filter_map(|(_, id)| self.records.get(id).cloned())
            .collect()
    }

    pub(crate) fn lookup(&self, id: &R::Id) -> Option<R> {
        self.records.get(id).cloned()
    }

    fn unindex(&mut self, id: R::Id) -> Result<(), ReplicationError> {
        let Some(serial) = self.serial_of.remove(&id) else {
            return Err(self.corrupted(format!("replaced record {id} has no serial")));
        };
        match self.by_serial.remove(&serial) {
            Some(indexed) if indexed == id => Ok(()),
            Some(other) => Err(self.corrupted(format!(
                "serial {serial} indexed {other}, expected {id}"
            ))),
            None => Err(self.corrupted(format!("serial {serial} of {id} missing"))),
        }
    }

    fn corrupted(&self, detail: String) -> ReplicationError {
        ReplicationError::IndexCorrupted {
            kind: R::KIND,
            symbol: self.symbol.clone(),
            detail,
        }
    }

    #[cfg(test)]
    fn forget_serial(&mut self, id: &R::Id) {
        self.serial_of.remove(id);
    }
}
