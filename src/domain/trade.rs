//! Exchange trades (fills) as replicated records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{OrderId, Symbol, TradeId};
use super::record::{Record, RecordKind};

/// A fill of one of our orders.
///
/// Trades are immutable on the exchange, so the trade time doubles as the
/// update timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: Symbol,
    pub order_id: OrderId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub quote_quantity: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
    pub is_buyer: bool,
    pub is_maker: bool,
    pub is_best_match: bool,
    pub time: DateTime<Utc>,
}

impl Record for Trade {
    type Id = TradeId;

    const KIND: RecordKind = RecordKind::Trade;

    fn id(&self) -> TradeId {
        self.id
    }

    fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.time
    }
}
