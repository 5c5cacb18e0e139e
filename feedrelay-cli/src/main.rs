//! feedrelay CLI - Command-line interface
//!
//! Exercises the feedrelay library against the configured services: fetch
//! endpoints through the cache/breaker/retry pipeline, relay feeds through
//! the CORS proxy pool, and inspect or clear the cache.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::cache::CacheAction;
use commands::fetch::FetchArgs;
use commands::proxy::ProxyArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "feedrelay")]
#[command(version = feedrelay::VERSION)]
#[command(about = "Resilient fetching for dashboard data feeds", long_about = None)]
struct Cli {
    /// Config file (default: ~/.feedrelay/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request an endpoint of a registered service and print the result
    Fetch(FetchArgs),
    /// Fetch a URL through the CORS relay pool and print the body
    Proxy(ProxyArgs),
    /// Print circuit breaker, cache and relay health as JSON
    Health,
    /// List configured services and relays
    Services,
    /// Inspect or clear the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Fetch(_) => "fetch",
            Commands::Proxy(_) => "proxy",
            Commands::Health => "health",
            Commands::Services => "services",
            Commands::Cache { .. } => "cache",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(cli.config.as_deref(), cli.debug)?;
    runner.log_startup(cli.command.name());

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(&runner, args).await,
        Commands::Proxy(args) => commands::proxy::run(&runner, args).await,
        Commands::Health => commands::health::run(&runner).await,
        Commands::Services => {
            commands::services::run(runner.config());
            Ok(())
        }
        Commands::Cache { action } => commands::cache::run(&runner, action),
    }
}
