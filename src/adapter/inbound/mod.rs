//! Inbound adapters: how operators drive the crate.

pub mod cli;
