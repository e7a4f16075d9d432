//! Immutable replica snapshot. Every reconciliation step builds a new view
//! from the previous one; readers keep whichever view they cloned.

use crate::domain::{Diff, Epoch, Record, RecordSet, Serial};

/// Records of one symbol as last reconciled, with the authority position
/// they reflect.
#[derive(Debug, Clone)]
pub struct ReplicaView<R: Record> {
    epoch: Epoch,
    serial: Serial,
    records: RecordSet<R>,
}

impl<R: Record> ReplicaView<R> {
    pub(crate) fn from_snapshot(diff: Diff<R>) -> Self {
        Self {
            epoch: diff.epoch,
            serial: diff.max_serial,
            records: RecordSet::from_records(diff.records),
        }
    }

    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Highest authority serial reflected locally.
    #[must_use]
    pub fn serial(&self) -> Serial {
        self.serial
    }

    #[must_use]
    pub fn records(&self) -> &RecordSet<R> {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn lookup(&self, id: &R::Id) -> Option<&R> {
        self.records.get(id)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<R> {
        self.records.to_vec()
    }

    /// Fold a diff into a new view, or `None` if it changes nothing.
    pub(crate) fn apply_diff(&self, diff: Diff<R>) -> Option<Self> {
        if diff.epoch != self.epoch {
            return Some(self.reset(diff));
        }
        self.merge(diff.max_serial, diff.records)
    }

    /// Merge records observed under the current epoch.
    pub(crate) fn merge(&self, serial: Serial, records: Vec<R>) -> Option<Self> {
        let serial = serial.max(self.serial);
        let mut next = self.records.clone();
        let mut changed = serial != self.serial;
        for record in records {
            changed |= next.apply(record).is_accepted();
        }
        changed.then(|| Self {
            epoch: self.epoch,
            serial,
            records: next,
        })
    }

    /// Replace the set with a snapshot from a new epoch.
    ///
    /// Identities absent from the snapshot are dropped. An identity whose
    /// local copy is strictly newer than the snapshot's keeps the local copy,
    /// so no reader ever sees a record go back in time.
    fn reset(&self, diff: Diff<R>) -> Self {
        let mut records = RecordSet::from_records(diff.records);
        let kept: Vec<R> = self
            .records
            .iter()
            .filter(|local| {
                records
                    .get(&local.id())
                    .is_some_and(|incoming| local.updated_at() > incoming.updated_at())
            })
            .cloned()
            .collect();
        for local in kept {
            records.apply(local);
        }
        Self {
            epoch: diff.epoch,
            serial: diff.max_serial,
            records,
        }
    }
}
