//! Exchange-agnostic domain types for record replication.

mod diff;
mod epoch;
pub mod error;
mod id;
mod order;
mod record;
mod record_set;
mod trade;

pub use diff::{Diff, Published, Receipt};
pub use epoch::{Epoch, Serial};
pub use error::DomainError;
pub use id::{OrderId, Symbol, TradeId};
pub use order::{Order, OrderFilter, OrderSide, OrderStatus, OrderType};
pub use record::{Record, RecordKind};
pub use record_set::{Applied, RecordSet};
pub use trade::Trade;
