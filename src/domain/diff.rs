//! Changes handed from an authority to its replicas.

use super::epoch::{Epoch, Serial};

/// A set of changed records under one epoch.
///
/// A full diff carries the complete record set and tells the receiver to
/// resynchronize; an incremental diff carries only records whose serial
/// falls in the requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff<R> {
    pub epoch: Epoch,
    /// Highest serial reflected by this diff.
    pub max_serial: Serial,
    pub records: Vec<R>,
    pub full: bool,
}

impl<R> Diff<R> {
    /// Complete state of an authority.
    pub fn full(epoch: Epoch, max_serial: Serial, records: Vec<R>) -> Self {
        Self {
            epoch,
            max_serial,
            records,
            full: true,
        }
    }

    /// Records changed since the receiver's watermark.
    pub fn incremental(epoch: Epoch, max_serial: Serial, records: Vec<R>) -> Self {
        Self {
            epoch,
            max_serial,
            records,
            full: false,
        }
    }

    /// Nothing new; the receiver stays at `watermark`.
    pub fn empty(epoch: Epoch, watermark: Serial) -> Self {
        Self::incremental(epoch, watermark, Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One accepted record as published on a broadcast topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Published<R> {
    pub epoch: Epoch,
    pub serial: Serial,
    pub record: R,
}

/// Acknowledgement of a submitted batch.
///
/// `serial` is the authority's highest serial after the batch was applied,
/// whether or not any record in it was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub epoch: Epoch,
    pub serial: Serial,
    pub accepted: usize,
}
