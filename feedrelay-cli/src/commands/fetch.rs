//! `feedrelay fetch` - request an endpoint of a registered service.

use clap::Args;
use feedrelay::client::RequestOptions;
use std::time::Duration;

use super::{parse_key_value, print_json};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Service identifier (see `feedrelay services`)
    pub service: String,

    /// Endpoint path relative to the service base URL, or an absolute URL
    pub endpoint: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "param", short = 'p', value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Skip the cache read (the response is still cached)
    #[arg(long)]
    pub no_cache: bool,

    /// Return the body as text instead of parsing JSON
    #[arg(long)]
    pub text: bool,

    /// Retries after the first attempt
    #[arg(long)]
    pub retries: Option<u32>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl FetchArgs {
    /// Translate the arguments into request options.
    pub fn options(&self) -> Result<RequestOptions, CliError> {
        let mut options = RequestOptions::new();
        for (key, value) in &self.params {
            options = options.param(key.clone(), value);
        }
        if self.no_cache {
            options = options.no_cache();
        }
        if self.text {
            options = options.text();
        }
        if let Some(retries) = self.retries {
            options = options.retries(retries);
        }
        if let Some(ms) = self.timeout_ms {
            if ms == 0 {
                return Err(CliError::InvalidArgument(
                    "--timeout-ms must be greater than zero".to_string(),
                ));
            }
            options = options.timeout(Duration::from_millis(ms));
        }
        Ok(options)
    }
}

/// Run the fetch command, printing the result as JSON.
pub async fn run(runner: &CliRunner, args: FetchArgs) -> Result<(), CliError> {
    let options = args.options()?;
    let client = runner.create_client()?;

    let outcome = client.request(&args.service, &args.endpoint, options).await;
    // Let any background refresh land in the storage tier before exiting
    client.wait_for_revalidations().await;
    client.shutdown().await;

    print_json(&outcome?)
}
