//! Replication versioning: epochs and serial numbers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-symbol change counter assigned by the authority to accepted writes.
///
/// Serials are only comparable under the same [`Epoch`].
pub type Serial = u64;

/// Token identifying one lifetime of an authority instance.
///
/// A fresh epoch is generated every time an authority is created, including
/// after a restart or a reload following a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(Uuid);

impl Epoch {
    /// Generate a new, unique epoch.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
