//! Command-line interface definitions.
//!
//! Defines the CLI structure for the tradesync binary using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Per-symbol order and trade replication service
#[derive(Parser, Debug)]
#[command(name = "tradesync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the tradesync CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run authorities and replicas for the configured symbols until Ctrl-C
    Run(RunArgs),

    /// Print the records stored for a symbol
    Dump(DumpArgs),

    /// Check a configuration file without starting anything
    Validate(ConfigArg),
}

/// Configuration file location shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct ConfigArg {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for `tradesync run`.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Seconds between authority statistics log lines
    #[arg(long, default_value_t = 30)]
    pub stats_interval: u64,
}

/// Arguments for `tradesync dump`.
#[derive(clap::Args, Debug)]
pub struct DumpArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Symbol whose records to print
    #[arg(short, long)]
    pub symbol: String,

    /// Print trades instead of orders
    #[arg(long)]
    pub trades: bool,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_parses_flags() {
        let cli = Cli::try_parse_from([
            "tradesync", "dump", "--symbol", "ethusdt", "--trades", "--json", "-c", "x.toml",
        ])
        .unwrap();
        let Commands::Dump(args) = cli.command else {
            panic!("expected dump");
        };
        assert_eq!(args.symbol, "ethusdt");
        assert!(args.trades && args.json);
        assert_eq!(args.config.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["tradesync", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config.config, PathBuf::from("config.toml"));
        assert_eq!(args.stats_interval, 30);
    }

    #[test]
    fn dump_requires_symbol() {
        assert!(Cli::try_parse_from(["tradesync", "dump"]).is_err());
    }
}
