//! `feedrelay health` - print the client health snapshot.

use super::print_json;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Print breaker, cache, relay and coalescing state as JSON.
///
/// The snapshot reflects a freshly started client; cache counters include
/// whatever the storage tier holds on disk.
pub async fn run(runner: &CliRunner) -> Result<(), CliError> {
    let client = runner.create_client()?;
    let status = client.health_status();
    client.shutdown().await;
    print_json(&status)
}
