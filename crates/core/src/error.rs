// SPDX-License-Identifier: MIT

//! The stable error-kind taxonomy a terminal job failure is classified into.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Runtime reported no output within the configured startup window.
    StartupTimeout,
    /// Runtime reported no output within the configured idle window during execution.
    IdleTimeout,
    /// Container exit code indicates out-of-memory (137 on Linux).
    Oom,
    /// Non-zero exit without a more specific kind.
    Crash,
    /// Runtime could not create the container at all.
    SpawnFailed,
    /// StreamParser detected a rate-limit terminal signal.
    RateLimit,
    /// StreamParser detected an expired OAuth token.
    AuthTokenExpired,
    /// StreamParser detected an authentication failure.
    AuthFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::StartupTimeout => "startup_timeout",
            ErrorKind::IdleTimeout => "idle_timeout",
            ErrorKind::Oom => "oom",
            ErrorKind::Crash => "crash",
            ErrorKind::SpawnFailed => "spawn_failed",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::AuthTokenExpired => "auth_token_expired",
            ErrorKind::AuthFailed => "auth_failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("session {0} already has an active job")]
    ActiveJobExists(String),

    #[error("authentication unavailable")]
    MissingAuthentication,

    #[error("container image not available")]
    MissingImage,

    #[error("storage error: {0}")]
    Store(String),

    #[error("failed to start container: {0}")]
    SpawnFailed(String),
}
