//! The replicated record abstraction.
//!
//! Orders and trades share one replication protocol. Each kind names its
//! identity type and exposes the fields the protocol needs: the partition
//! symbol, the identity, and the update timestamp used for conflict
//! resolution.

use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::Symbol;

/// The closed set of replicated record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Order,
    Trade,
}

impl RecordKind {
    /// Stable lowercase name used in logs and storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Trade => "trade",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record replicated from the authority to its replicas.
///
/// Records with the same [`id`](Record::id) are the same logical record
/// regardless of their other fields.
pub trait Record: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Identity type. Record sets are ordered by it.
    type Id: Copy + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Which kind of record this is.
    const KIND: RecordKind;

    /// Stable identity of the logical record.
    fn id(&self) -> Self::Id;

    /// Partition key.
    fn symbol(&self) -> &Symbol;

    /// Timestamp of the last business update, used for last-write-wins.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Whether this record may replace `current` under last-write-wins.
    ///
    /// Ties are accepted so re-applying the same record is idempotent.
    fn supersedes(&self, current: &Self) -> bool {
        self.updated_at() >= current.updated_at()
    }
}
