//! Application services (use cases).
//!
//! The authority owns each symbol's records, replicas mirror them for
//! readers, the provider is what trading workers call and the ingest pump
//! feeds exchange updates into the authority.

pub mod authority;
pub mod ingest;
pub mod provider;
pub mod replica;

pub use authority::{AuthorityHandle, AuthorityRegistry, AuthorityStats};
pub use ingest::{ingest_channel, IngestPump, IngestSink, IngestStats};
pub use provider::Provider;
pub use replica::{Replica, ReplicaMode, ReplicaRegistry, ReplicaView};
