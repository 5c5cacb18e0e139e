//! Cache management CLI commands.

use clap::Subcommand;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,
    /// Remove cached entries
    Clear {
        /// Only remove entries whose key contains this text
        #[arg(long)]
        pattern: Option<String>,
    },
}

/// Run a cache subcommand.
pub fn run(runner: &CliRunner, action: CacheAction) -> Result<(), CliError> {
    let cache = runner.open_cache()?;

    match action {
        CacheAction::Stats => {
            match &runner.config().cache.directory {
                Some(dir) if runner.config().cache.enabled => {
                    println!("Storage tier: {}", dir.display())
                }
                _ => println!("Storage tier: disabled"),
            }
            println!("{}", cache.format_stats());
        }
        CacheAction::Clear { pattern } => {
            let removed = match pattern.as_deref() {
                Some(p) if !p.is_empty() => cache.invalidate(p),
                _ => cache.clear(),
            };
            println!("Removed {} cached entries", removed);
        }
    }
    Ok(())
}
