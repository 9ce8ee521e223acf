// SPDX-License-Identifier: MIT

//! Process management for `wardend`: finding the binary, starting it in the
//! background, and probing/cleaning up its socket.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::client::ClientError;

/// Find the `wardend` binary: next to our own executable first (covers both
/// debug and installed builds), then fall back to `PATH`.
fn find_wardend_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("wardend");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("wardend")
}

/// Start `wardend` in the background, returning the child handle.
pub fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    Command::new(find_wardend_binary())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

/// Probe whether a Unix socket is accepting connections.
pub fn probe_socket(socket_path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(socket_path).is_ok()
}

/// Remove a stale socket file left behind by a daemon that is no longer
/// running. Safe to call even if the file is gone.
pub fn cleanup_stale_socket(socket_path: &Path) {
    if socket_path.exists() {
        let _ = std::fs::remove_file(socket_path);
    }
}

/// Poll interval while waiting for a freshly spawned daemon to start
/// accepting connections.
pub fn poll_interval() -> Duration {
    Duration::from_millis(50)
}

/// How long to wait for a freshly spawned daemon to start accepting
/// connections before giving up.
pub fn connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Wait for `socket_path` to start accepting connections, or for `child` to
/// exit early (a startup failure), whichever happens first.
pub fn wait_for_socket(
    socket_path: &Path,
    mut child: std::process::Child,
) -> Result<(), ClientError> {
    let start = Instant::now();
    while start.elapsed() < connect_timeout() {
        if probe_socket(socket_path) {
            return Ok(());
        }
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(ClientError::DaemonStartFailed(format!("wardend exited with {status}")));
            }
            Ok(None) => {}
            Err(_) => {}
        }
        std::thread::sleep(poll_interval());
    }
    Err(ClientError::DaemonStartTimeout)
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
