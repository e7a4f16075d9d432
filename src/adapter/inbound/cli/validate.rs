//! Handler for the `validate` command.

use crate::adapter::inbound::cli::command::ConfigArg;
use crate::error::Result;
use crate::infrastructure::config::Config;

/// Load and validate the configuration, then summarize it.
pub fn execute(args: &ConfigArg) -> Result<()> {
    let config = Config::load(&args.config)?;
    let symbols: Vec<&str> = config
        .replication
        .symbols
        .iter()
        .map(|s| s.as_str())
        .collect();
    println!("{} is valid", args.config.display());
    println!("  database:  {}", config.database.url);
    println!("  transport: {}", config.replication.transport.as_str());
    println!("  symbols:   {}", symbols.join(", "));
    Ok(())
}
