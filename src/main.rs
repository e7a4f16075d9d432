use anyhow::Context;
use clap::Parser;

use tradesync::adapter::inbound::cli::command::{Cli, Commands};
use tradesync::adapter::inbound::cli::{dump, run, validate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(&args).await.context("run failed"),
        Commands::Dump(args) => dump::execute(&args).await.context("dump failed"),
        Commands::Validate(args) => validate::execute(&args)
            .with_context(|| format!("invalid configuration {}", args.config.display())),
    }
}
