//! `feedrelay proxy` - fetch a URL through the relay pool.

use clap::Args;
use feedrelay::client::RequestOptions;
use std::time::Duration;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the proxy command.
#[derive(Debug, Args)]
pub struct ProxyArgs {
    /// Target URL to relay
    pub url: String,

    /// Per-relay timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Accept header override
    #[arg(long)]
    pub accept: Option<String>,
}

/// Run the proxy command, printing the relayed body verbatim.
pub async fn run(runner: &CliRunner, args: ProxyArgs) -> Result<(), CliError> {
    if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
        return Err(CliError::InvalidArgument(format!(
            "'{}' is not an http(s) URL",
            args.url
        )));
    }

    let mut options = RequestOptions::new();
    if let Some(ms) = args.timeout_ms.filter(|ms| *ms > 0) {
        options = options.timeout(Duration::from_millis(ms));
    }
    if let Some(accept) = args.accept {
        options = options.accept(accept);
    }

    let client = runner.create_client()?;
    let body = client.fetch_with_proxy(&args.url, options).await;
    client.shutdown().await;

    println!("{}", body?);
    Ok(())
}
