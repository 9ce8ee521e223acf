// SPDX-License-Identifier: MIT

//! Thin client over the Unix socket `wardend` listens on, with auto-start:
//! a command that finds no daemon running spawns one and waits for its
//! socket rather than failing outright.

use std::path::PathBuf;

use thiserror::Error;
use tokio::net::UnixStream;
use warden_daemon::protocol::{self, ProtocolError};
use warden_daemon::{Config, Request, Response};

use crate::daemon_process::{cleanup_stale_socket, probe_socket, start_daemon_background, wait_for_socket};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not determine wardend's configuration: {0}")]
    Config(#[from] warden_daemon::ConfigError),

    #[error("failed to start wardend: {0}")]
    DaemonStartFailed(String),

    #[error("timed out waiting for wardend to start")]
    DaemonStartTimeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response from wardend")]
    UnexpectedResponse,
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to a running daemon, starting one in the background first if
    /// its socket is absent or stale.
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        let config = Config::load()?;
        let socket_path = config.socket_path;

        if socket_path.exists() {
            if probe_socket(&socket_path) {
                return Ok(Self { socket_path });
            }
            cleanup_stale_socket(&socket_path);
        }

        let child = start_daemon_background()?;
        let socket_path_for_wait = socket_path.clone();
        tokio::task::spawn_blocking(move || wait_for_socket(&socket_path_for_wait, child))
            .await
            .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))??;
        Ok(Self { socket_path })
    }

    /// Connect to a running daemon without starting one. Used by read-only
    /// commands for which an absent daemon is simply "nothing to report".
    pub async fn connect(config: &Config) -> Result<Self, ClientError> {
        Ok(Self { socket_path: config.socket_path.clone() })
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(request)?;
        tokio::time::timeout(protocol::DEFAULT_TIMEOUT, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(protocol::DEFAULT_TIMEOUT, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        protocol::decode(&response_bytes).map_err(ClientError::from)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
