//! SQLite persistence adapter using Diesel ORM.

pub mod database;
pub mod store;

pub use store::SqliteRecordStore;
