//! Exchange orders as replicated records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{OrderId, Symbol};
use super::record::{Record, RecordKind};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            _ => Err(DomainError::UnknownVariant {
                kind: "order side",
                value: s.to_string(),
            }),
        }
    }
}

/// Exchange order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    LimitMaker,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    TakeProfitLimit,
}

impl OrderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::Market => "MARKET",
            Self::LimitMaker => "LIMIT_MAKER",
            Self::StopLoss => "STOP_LOSS",
            Self::StopLossLimit => "STOP_LOSS_LIMIT",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "LIMIT" => Self::Limit,
            "MARKET" => Self::Market,
            "LIMIT_MAKER" => Self::LimitMaker,
            "STOP_LOSS" => Self::StopLoss,
            "STOP_LOSS_LIMIT" => Self::StopLossLimit,
            "TAKE_PROFIT" => Self::TakeProfit,
            "TAKE_PROFIT_LIMIT" => Self::TakeProfitLimit,
            _ => {
                return Err(DomainError::UnknownVariant {
                    kind: "order type",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Whether the order may still change on the exchange.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::New | Self::PartiallyFilled | Self::PendingCancel)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NEW" => Self::New,
            "PARTIALLY_FILLED" => Self::PartiallyFilled,
            "FILLED" => Self::Filled,
            "CANCELED" => Self::Canceled,
            "PENDING_CANCEL" => Self::PendingCancel,
            "REJECTED" => Self::Rejected,
            "EXPIRED" => Self::Expired,
            _ => {
                return Err(DomainError::UnknownVariant {
                    kind: "order status",
                    value: s.to_string(),
                })
            }
        })
    }
}

/// An exchange order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub client_order_id: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Decimal,
    pub original_quantity: Decimal,
    pub executed_quantity: Decimal,
    pub cumulative_quote_quantity: Decimal,
    pub stop_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order is still open on the exchange.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.status.is_transient()
    }

    /// Whether any quantity of the order was executed.
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.executed_quantity > Decimal::ZERO
    }

    /// Closed orders that executed something.
    #[must_use]
    pub fn is_completed_significant(&self) -> bool {
        !self.is_transient() && self.is_significant()
    }

    /// Quantity still open on the book.
    #[must_use]
    pub fn remaining_quantity(&self) -> Decimal {
        (self.original_quantity - self.executed_quantity).max(Decimal::ZERO)
    }
}

/// Convenience filter over an order snapshot.
///
/// All criteria are combined with AND; the default filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub side: Option<OrderSide>,
    pub transient_only: bool,
    pub significant_only: bool,
}

impl OrderFilter {
    /// Open orders on one side of the book.
    #[must_use]
    pub fn open(side: OrderSide) -> Self {
        Self {
            side: Some(side),
            transient_only: true,
            significant_only: false,
        }
    }

    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.side.map_or(true, |side| order.side == side)
            && (!self.transient_only || order.is_transient())
            && (!self.significant_only || order.is_significant())
    }
}

impl Record for Order {
    type Id = OrderId;

    const KIND: RecordKind = RecordKind::Order;

    fn id(&self) -> OrderId {
        self.id
    }

    fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::order;
    use rust_decimal_macros::dec;

    #[test]
    fn transient_statuses() {
        assert!(OrderStatus::New.is_transient());
        assert!(OrderStatus::PartiallyFilled.is_transient());
        assert!(OrderStatus::PendingCancel.is_transient());
        assert!(!OrderStatus::Filled.is_transient());
        assert!(!OrderStatus::Canceled.is_transient());
        assert!(!OrderStatus::Rejected.is_transient());
        assert!(!OrderStatus::Expired.is_transient());
    }

    #[test]
    fn significance_follows_executed_quantity() {
        let untouched = order(1).status(OrderStatus::Canceled).build();
        assert!(!untouched.is_significant());
        assert!(!untouched.is_completed_significant());

        let partial_cancel = order(2)
            .status(OrderStatus::Canceled)
            .quantity(dec!(10))
            .executed(dec!(4))
            .build();
        assert!(partial_cancel.is_completed_significant());
        assert_eq!(partial_cancel.remaining_quantity(), dec!(6));

        let open_partial = order(3)
            .status(OrderStatus::PartiallyFilled)
            .executed(dec!(1))
            .build();
        assert!(open_partial.is_significant());
        assert!(!open_partial.is_completed_significant());
    }

    #[test]
    fn enums_round_trip_through_their_text_form() {
        for status in [
            OrderStatus::New,
            OrderStatus::PartiallyFilled,
            OrderStatus::Filled,
            OrderStatus::Canceled,
            OrderStatus::PendingCancel,
            OrderStatus::Rejected,
            OrderStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!("LIMIT_MAKER".parse::<OrderType>(), Ok(OrderType::LimitMaker));
        assert!(matches!(
            "HOLD".parse::<OrderSide>(),
            Err(DomainError::UnknownVariant { kind: "order side", .. })
        ));
    }

    #[test]
    fn filter_combines_criteria() {
        let open_buy = order(1).side(OrderSide::Buy).status(OrderStatus::New).build();
        let open_sell = order(2).side(OrderSide::Sell).status(OrderStatus::New).build();
        let filled_buy = order(3)
            .side(OrderSide::Buy)
            .status(OrderStatus::Filled)
            .executed(dec!(1))
            .build();

        let open_buys = OrderFilter::open(OrderSide::Buy);
        assert!(open_buys.matches(&open_buy));
        assert!(!open_buys.matches(&open_sell));
        assert!(!open_buys.matches(&filled_buy));

        let significant = OrderFilter {
            significant_only: true,
            ..OrderFilter::default()
        };
        assert!(significant.matches(&filled_buy));
        assert!(!significant.matches(&open_buy));
        assert!(OrderFilter::default().matches(&open_sell));
    }

    #[test]
    fn status_serializes_in_exchange_format() {
        let json = serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap();
        assert_eq!(json, "\"PARTIALLY_FILLED\"");
        let side: OrderSide = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(side, OrderSide::Sell);
    }
}
