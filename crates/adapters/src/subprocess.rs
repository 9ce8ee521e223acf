// SPDX-License-Identifier: MIT

//! Subprocess execution helpers.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Timeout for introspection calls (`inspect`, `stats`, `ps`) — the port's
/// own 5-second budget from the concurrency model.
pub const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for `docker run`/`docker kill`/`docker rm` calls.
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a subprocess command with a timeout. The child is killed automatically
/// if the timeout elapses (via the tokio `Child` drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => Err(format!("{description} timed out after {}s", timeout.as_secs())),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
