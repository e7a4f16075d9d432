//! Outbound ports (driven side): interfaces implemented by outbound adapters
//! and by the authority.

pub mod authority;
pub mod feed;
pub mod store;

pub use authority::AuthorityApi;
pub use feed::{FeedEvent, FeedSubscription, RecordFeed};
pub use store::RecordStore;
