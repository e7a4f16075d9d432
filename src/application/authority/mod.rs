//! Authority service: the single-writer source of truth per symbol.

mod actor;
mod persist;
mod registry;
mod state;
mod waiters;

pub use actor::{spawn_authority, AuthorityHandle, AuthorityStats};
pub use registry::AuthorityRegistry;
