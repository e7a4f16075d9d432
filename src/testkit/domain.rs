//! Builders for domain records used across tests.
//!
//! Every builder starts from a plausible BTCUSDT record so tests only spell
//! out the fields they assert on.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{Order, OrderId, OrderSide, OrderStatus, OrderType, Symbol, Trade, TradeId};

/// 2024-01-01T00:00:00Z plus `secs` seconds.
pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200 + secs, 0).unwrap_or_default()
}

/// Start building an order with the given id.
pub fn order(id: u64) -> OrderBuilder {
    OrderBuilder {
        order: Order {
            id: OrderId::new(id),
            symbol: Symbol::new("BTCUSDT"),
            client_order_id: format!("client-{id}"),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            status: OrderStatus::New,
            price: dec!(100),
            original_quantity: dec!(1),
            executed_quantity: Decimal::ZERO,
            cumulative_quote_quantity: Decimal::ZERO,
            stop_price: Decimal::ZERO,
            created_at: ts(0),
            updated_at: ts(0),
        },
    }
}

/// Start building a trade with the given id.
pub fn trade(id: u64) -> TradeBuilder {
    TradeBuilder {
        trade: Trade {
            id: TradeId::new(id),
            symbol: Symbol::new("BTCUSDT"),
            order_id: OrderId::new(id),
            price: dec!(100),
            quantity: dec!(1),
            quote_quantity: dec!(100),
            commission: dec!(0.001),
            commission_asset: "BNB".to_string(),
            is_buyer: true,
            is_maker: false,
            is_best_match: true,
            time: ts(0),
        },
    }
}

#[derive(Debug, Clone)]
pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    pub fn symbol(mut self, symbol: &str) -> Self {
        self.order.symbol = Symbol::new(symbol);
        self
    }

    pub fn side(mut self, side: OrderSide) -> Self {
        self.order.side = side;
        self
    }

    pub fn order_type(mut self, order_type: OrderType) -> Self {
        self.order.order_type = order_type;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.order.status = status;
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.order.price = price;
        self
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.order.original_quantity = quantity;
        self
    }

    /// Executed quantity; the quote total follows from the price.
    pub fn executed(mut self, executed: Decimal) -> Self {
        self.order.executed_quantity = executed;
        self.order.cumulative_quote_quantity = executed * self.order.price;
        self
    }

    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.order.created_at = at;
        self
    }

    pub fn updated(mut self, at: DateTime<Utc>) -> Self {
        self.order.updated_at = at;
        self
    }

    pub fn build(self) -> Order {
        self.order
    }
}

#[derive(Debug, Clone)]
pub struct TradeBuilder {
    trade: Trade,
}

impl TradeBuilder {
    pub fn symbol(mut self, symbol: &str) -> Self {
        self.trade.symbol = Symbol::new(symbol);
        self
    }

    pub fn order(mut self, order_id: u64) -> Self {
        self.trade.order_id = OrderId::new(order_id);
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.trade.price = price;
        self.trade.quote_quantity = price * self.trade.quantity;
        self
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.trade.quantity = quantity;
        self.trade.quote_quantity = self.trade.price * quantity;
        self
    }

    pub fn time(mut self, at: DateTime<Utc>) -> Self {
        self.trade.time = at;
        self
    }

    pub fn build(self) -> Trade {
        self.trade
    }
}
