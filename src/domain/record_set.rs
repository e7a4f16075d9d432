//! Identity-ordered, duplicate-free record collection.

use std::collections::BTreeMap;

use super::record::Record;

/// Outcome of applying a record to a [`RecordSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Applied<R> {
    /// No record with this identity existed.
    Inserted,
    /// The incoming record replaced the returned one.
    Replaced(R),
    /// The incoming record was older than the current one and was dropped.
    Stale,
}

impl<R> Applied<R> {
    /// Whether the set changed.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// Records of one symbol ordered by identity, at most one per identity.
///
/// Every mutation goes through [`apply`](RecordSet::apply), which enforces
/// last-write-wins by update timestamp.
#[derive(Debug, Clone)]
pub struct RecordSet<R: Record> {
    records: BTreeMap<R::Id, R>,
}

impl<R: Record> RecordSet<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Build a set from arbitrary records, resolving duplicates by
    /// last-write-wins.
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.apply(record);
        }
        set
    }

    /// Apply a record under last-write-wins.
    pub fn apply(&mut self, record: R) -> Applied<R> {
        match self.records.get(&record.id()) {
            Some(current) if !record.supersedes(current) => Applied::Stale,
            _ => match self.records.insert(record.id(), record) {
                Some(previous) => Applied::Replaced(previous),
                None => Applied::Inserted,
            },
        }
    }

    /// Look up a record by identity.
    #[must_use]
    pub fn get(&self, id: &R::Id) -> Option<&R> {
        self.records.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in identity order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &R> + '_ {
        self.records.values()
    }

    /// Clone the records into a vector, in identity order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<R> {
        self.records.values().cloned().collect()
    }

    /// Records matching `predicate`, in identity order.
    pub fn filtered<F>(&self, predicate: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        self.records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

impl<R: Record> Default for RecordSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> PartialEq for RecordSet<R> {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl<R: Record> FromIterator<R> for RecordSet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
