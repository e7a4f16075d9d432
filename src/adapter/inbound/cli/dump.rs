//! Handler for the `dump` command.

use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::DumpArgs;
use crate::adapter::outbound::sqlite::database::connection;
use crate::adapter::outbound::sqlite::SqliteRecordStore;
use crate::domain::{Order, Symbol, Trade};
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::outbound::RecordStore;

#[derive(Tabled)]
struct OrderRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Type")]
    order_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Executed")]
    executed: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl OrderRow {
    fn new(order: &Order) -> Self {
        Self {
            id: order.id.value(),
            side: order.side.to_string(),
            order_type: order.order_type.to_string(),
            status: order.status.to_string(),
            price: order.price.to_string(),
            quantity: order.original_quantity.to_string(),
            executed: order.executed_quantity.to_string(),
            updated: order.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Tabled)]
struct TradeRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Order")]
    order_id: u64,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Commission")]
    commission: String,
    #[tabled(rename = "Maker")]
    maker: bool,
    #[tabled(rename = "Time")]
    time: String,
}

impl TradeRow {
    fn new(trade: &Trade) -> Self {
        Self {
            id: trade.id.value(),
            order_id: trade.order_id.value(),
            price: trade.price.to_string(),
            quantity: trade.quantity.to_string(),
            commission: format!("{} {}", trade.commission, trade.commission_asset),
            maker: trade.is_maker,
            time: trade.time.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Print the stored orders or trades of one symbol.
pub async fn execute(args: &DumpArgs) -> Result<()> {
    let config = Config::load(&args.config.config)?;
    let store = SqliteRecordStore::new(connection::open(&config.database.url)?);
    let symbol = Symbol::new(args.symbol.as_str());

    let rendered = if args.trades {
        let trades = RecordStore::<Trade>::load_all(&store, &symbol).await?;
        render(&trades, args.json, TradeRow::new)?
    } else {
        let orders = RecordStore::<Order>::load_all(&store, &symbol).await?;
        render(&orders, args.json, OrderRow::new)?
    };
    println!("{rendered}");
    Ok(())
}

fn render<R, T>(records: &[R], json: bool, row: impl Fn(&R) -> T) -> Result<String>
where
    R: serde::Serialize,
    T: Tabled,
{
    if json {
        return Ok(serde_json::to_string_pretty(records)?);
    }
    if records.is_empty() {
        return Ok("No records.".to_string());
    }
    Ok(Table::new(records.iter().map(row)).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{order, trade};

    #[test]
    fn table_lists_one_row_per_order() {
        let orders = vec![order(1).build(), order(2).build()];
        let table = render(&orders, false, OrderRow::new).unwrap();
        assert!(table.contains("Status"));
        assert_eq!(table.matches("BUY").count(), 2);
    }

    #[test]
    fn json_keeps_exchange_spelling() {
        let trades = vec![trade(4).build()];
        let json = render(&trades, true, TradeRow::new).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["id"], 4);
        assert_eq!(parsed[0]["symbol"], "BTCUSDT");
    }

    #[test]
    fn empty_dump_says_so() {
        let orders: Vec<Order> = Vec::new();
        assert_eq!(render(&orders, false, OrderRow::new).unwrap(), "No records.");
    }
}
