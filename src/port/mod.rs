//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!  workers ──► inbound::RecordProvider       │
//!            │        Replica ◄── Authority  │
//!            └─────┬───────────────┬────────┘
//!                  ▼               ▼
//!            outbound::RecordFeed  outbound::RecordStore
//! ```
//!
//! - [`inbound`]: the surface trading workers call.
//! - [`outbound`]: the store, the broadcast topic and the authority contract
//!   that replicas reconcile against.

pub mod inbound;
pub mod outbound;
