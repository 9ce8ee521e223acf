// SPDX-License-Identifier: MIT

//! Centralized environment variable access and the daemon's configuration
//! struct. Configuration is an immutable value constructed once at startup;
//! there are no process-wide mutable singletons in the core.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use warden_storage::layout::expand_home;

const DEFAULT_IMAGE: &str = "warden/runner:latest";
const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_OUTPUT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a state directory (set WARDEN_STATE_DIR or HOME)")]
    NoStateDir,
}

/// Immutable configuration for a `wardend` process, constructed once at
/// startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub sessions_dir: PathBuf,
    pub workspaces_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub image: String,
    pub webhook_url: Option<String>,
    /// Window a session may sit idle before `Cleanup` deletes it.
    pub session_idle_timeout: Duration,
    /// Window the watcher waits for the first output line before
    /// classifying the job as `startup_timeout`.
    pub startup_timeout: Duration,
    /// Window the watcher waits between output lines, once running, before
    /// classifying the job as `idle_timeout`.
    pub output_idle_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        let sessions_dir = env_path("WARDEN_SESSIONS_DIR").unwrap_or_else(|| state_dir.join("sessions"));
        let workspaces_dir =
            env_path("WARDEN_WORKSPACES_DIR").unwrap_or_else(|| state_dir.join("workspaces"));

        Ok(Self {
            sessions_dir,
            workspaces_dir,
            socket_path: state_dir.join("wardend.sock"),
            lock_path: state_dir.join("wardend.pid"),
            log_path: state_dir.join("wardend.log"),
            image: std::env::var("WARDEN_IMAGE").unwrap_or_else(|_| DEFAULT_IMAGE.to_string()),
            webhook_url: std::env::var("WARDEN_WEBHOOK_URL").ok(),
            session_idle_timeout: env_duration_secs("WARDEN_SESSION_IDLE_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_SESSION_IDLE_TIMEOUT),
            startup_timeout: env_duration_secs("WARDEN_STARTUP_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_STARTUP_TIMEOUT),
            output_idle_timeout: env_duration_secs("WARDEN_OUTPUT_IDLE_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_OUTPUT_IDLE_TIMEOUT),
        })
    }
}

/// Resolves the state directory: `WARDEN_STATE_DIR` > `XDG_STATE_HOME/warden`
/// > `~/.local/state/warden`.
fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("WARDEN_STATE_DIR") {
        return Ok(expand_home(&dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("warden"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/warden"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().map(|s| expand_home(&s))
}

fn env_duration_secs(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_secs)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
