//! Database model types for Diesel ORM.
//!
//! Decimals and timestamps are stored as text so they round-trip exactly.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::schema::{orders, trades};
use crate::domain::{Order, OrderId, Symbol, Trade, TradeId};
use crate::error::{Error, Result};

/// Database row for an order.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderRow {
    pub symbol: String,
    pub id: i64,
    pub client_order_id: String,
    pub side: String,
    pub order_type: String,
    pub status: String,
    pub price: String,
    pub original_quantity: String,
    pub executed_quantity: String,
    pub cumulative_quote_quantity: String,
    pub stop_price: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a trade.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub symbol: String,
    pub id: i64,
    pub order_id: i64,
    pub price: String,
    pub quantity: String,
    pub quote_quantity: String,
    pub commission: String,
    pub commission_asset: String,
    pub is_buyer: bool,
    pub is_maker: bool,
    pub is_best_match: bool,
    pub time: String,
}

impl OrderRow {
    pub fn from_order(order: &Order) -> Result<Self> {
        Ok(Self {
            symbol: order.symbol.as_str().to_string(),
            id: to_row_id(order.id.value())?,
            client_order_id: order.client_order_id.clone(),
            side: order.side.as_str().to_string(),
            order_type: order.order_type.as_str().to_string(),
            status: order.status.as_str().to_string(),
            price: order.price.to_string(),
            original_quantity: order.original_quantity.to_string(),
            executed_quantity: order.executed_quantity.to_string(),
            cumulative_quote_quantity: order.cumulative_quote_quantity.to_string(),
            stop_price: order.stop_price.to_string(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        })
    }

    pub fn into_order(self) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(from_row_id(self.id)?),
            symbol: Symbol::new(self.symbol),
            client_order_id: self.client_order_id,
            side: parse_field(&self.side)?,
            order_type: parse_field(&self.order_type)?,
            status: parse_field(&self.status)?,
            price: parse_decimal(&self.price)?,
            original_quantity: parse_decimal(&self.original_quantity)?,
            executed_quantity: parse_decimal(&self.executed_quantity)?,
            cumulative_quote_quantity: parse_decimal(&self.cumulative_quote_quantity)?,
            stop_price: parse_decimal(&self.stop_price)?,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

impl TradeRow {
    pub fn from_trade(trade: &Trade) -> Result<Self> {
        Ok(Self {
            symbol: trade.symbol.as_str().to_string(),
            id: to_row_id(trade.id.value())?,
            order_id: to_row_id(trade.order_id.value())?,
            price: trade.price.to_string(),
            quantity: trade.quantity.to_string(),
            quote_quantity: trade.quote_quantity.to_string(),
            commission: trade.commission.to_string(),
            commission_asset: trade.commission_asset.clone(),
            is_buyer: trade.is_buyer,
            is_maker: trade.is_maker,
            is_best_match: trade.is_best_match,
            time: trade.time.to_rfc3339(),
        })
    }

    pub fn into_trade(self) -> Result<Trade> {
        Ok(Trade {
            id: TradeId::new(from_row_id(self.id)?),
            symbol: Symbol::new(self.symbol),
            order_id: OrderId::new(from_row_id(self.order_id)?),
            price: parse_decimal(&self.price)?,
            quantity: parse_decimal(&self.quantity)?,
            quote_quantity: parse_decimal(&self.quote_quantity)?,
            commission: parse_decimal(&self.commission)?,
            commission_asset: self.commission_asset,
            is_buyer: self.is_buyer,
            is_maker: self.is_maker,
            is_best_match: self.is_best_match,
            time: parse_time(&self.time)?,
        })
    }
}

fn to_row_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| Error::Parse(format!("id {id} exceeds storage range")))
}

fn from_row_id(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| Error::Parse(format!("negative id {id}")))
}

fn parse_field<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| Error::Parse(e.to_string()))
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| Error::Parse(format!("decimal '{value}': {e}")))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("timestamp '{value}': {e}")))
}
