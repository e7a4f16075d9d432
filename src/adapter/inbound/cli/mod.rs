//! CLI module graph.

pub mod command;
pub mod dump;
pub mod run;
pub mod validate;
