// SPDX-License-Identifier: MIT

//! Docker-backed `Runtime`: every operation shells out to the `docker` CLI.
//!
//! Sandboxing decisions (memory/CPU limits, network mode, capability drops,
//! volume mounts) are this adapter's concern, never the core's — it only
//! receives the paths and env it needs from `StartOpts`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use warden_core::ContainerMetrics;

use super::{
    ContainerListEntry, ContainerStatus, GetLogsOptions, LogStream, Runtime, RuntimeError,
    StartOpts, StartedContainer,
};
use crate::subprocess::{run_with_timeout, CONTROL_TIMEOUT, INTROSPECTION_TIMEOUT};

/// Memory limit applied to every spawned container.
const DEFAULT_MEMORY_LIMIT: &str = "4g";
/// Output channel capacity between the `docker logs -f` reader and the watcher.
const LOG_CHANNEL_CAPACITY: usize = 256;

pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self { binary: "docker".to_string() }
    }

    /// Override the `docker` binary name/path, e.g. for `podman` compatibility.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Running")]
    running: bool,
    #[serde(rename = "ExitCode")]
    exit_code: i64,
    #[serde(rename = "StartedAt")]
    started_at: String,
    #[serde(rename = "FinishedAt")]
    finished_at: String,
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    if s.starts_with("0001-01-01") {
        return None;
    }
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl Runtime for DockerRuntime {
    async fn check_image(&self, image: &str) -> bool {
        let mut cmd = self.command();
        cmd.args(["image", "inspect", image]);
        matches!(
            run_with_timeout(cmd, INTROSPECTION_TIMEOUT, "docker image inspect").await,
            Ok(output) if output.status.success()
        )
    }

    async fn start_detached(&self, opts: StartOpts) -> Result<StartedContainer, RuntimeError> {
        let mut cmd = self.command();
        cmd.args(["run", "-d", "--rm=false"])
            .args(["--name", &opts.container_name])
            .args(["--memory", DEFAULT_MEMORY_LIMIT])
            .args(["--network", "bridge"])
            .args(["--cap-drop", "ALL"])
            .arg("-v")
            .arg(format!("{}:/workspace", opts.workspace_path.display()))
            .arg("-v")
            .arg(format!("{}:/credentials:ro", opts.credentials_path.display()));
        for (key, value) in &opts.env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg(&opts.image).arg(&opts.prompt);

        let output = run_with_timeout(cmd, CONTROL_TIMEOUT, "docker run")
            .await
            .map_err(RuntimeError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RuntimeError::SpawnFailed(stderr));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(StartedContainer { container_name: opts.container_name, container_id })
    }

    async fn stream_logs(&self, container_name: &str) -> Result<LogStream, RuntimeError> {
        let mut cmd = self.command();
        cmd.args(["logs", "-f", "--since", "0", container_name])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());

        let mut child = cmd.spawn().map_err(|e| RuntimeError::Transport(e.to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            RuntimeError::Transport("docker logs: no stdout handle".to_string())
        })?;

        let (line_tx, line_rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        let (exit_tx, exit_rx) = oneshot::channel();

        let binary = self.binary.clone();
        let container_name = container_name.to_string();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            loop {
                match reader.next_line().await {
                    Ok(Some(line)) => {
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(container = %container_name, error = %e, "docker logs read error");
                        break;
                    }
                }
            }
            let _ = child.wait().await;
            let exit_code = inspect_exit_code(&binary, &container_name).await;
            let _ = exit_tx.send(exit_code);
        });

        Ok(LogStream { lines: line_rx, exit_code: exit_rx })
    }

    async fn get_logs(&self, container_name: &str, opts: GetLogsOptions) -> Option<Vec<u8>> {
        let mut cmd = self.command();
        cmd.arg("logs");
        if let Some(tail) = opts.tail_lines {
            cmd.args(["--tail", &tail.to_string()]);
        }
        cmd.arg(container_name);
        let output = run_with_timeout(cmd, CONTROL_TIMEOUT, "docker logs").await.ok()?;
        Some(output.stdout)
    }

    async fn get_status(&self, container_name: &str) -> Option<ContainerStatus> {
        let entry = inspect(&self.binary, container_name).await?;
        Some(ContainerStatus {
            running: entry.state.running,
            exit_code: (!entry.state.running).then_some(entry.state.exit_code as i32),
            started_at: parse_rfc3339(&entry.state.started_at),
            finished_at: parse_rfc3339(&entry.state.finished_at),
        })
    }

    async fn get_stats(&self, container_name: &str) -> Option<ContainerMetrics> {
        let mut cmd = self.command();
        cmd.args(["stats", "--no-stream", "--format", "{{json .}}", container_name]);
        let output = run_with_timeout(cmd, INTROSPECTION_TIMEOUT, "docker stats").await.ok()?;
        if !output.status.success() {
            return None;
        }
        let line = String::from_utf8_lossy(&output.stdout);
        let line = line.lines().next()?;
        parse_stats_line(line)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Vec<ContainerListEntry> {
        let mut cmd = self.command();
        cmd.args([
            "ps",
            "-a",
            "--filter",
            &format!("name=^{prefix}"),
            "--format",
            "{{.Names}}\t{{.State}}\t{{.CreatedAt}}",
        ]);
        let Ok(output) = run_with_timeout(cmd, INTROSPECTION_TIMEOUT, "docker ps").await else {
            return Vec::new();
        };
        if !output.status.success() {
            return Vec::new();
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| {
                let mut parts = line.splitn(3, '\t');
                let name = parts.next()?.to_string();
                let state = parts.next().unwrap_or_default();
                let created_at = parts.next().and_then(|s| {
                    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z %Z")
                        .ok()
                        .map(|t| t.with_timezone(&Utc))
                });
                Some(ContainerListEntry { name, running: state == "running", created_at })
            })
            .collect()
    }

    async fn kill(&self, container_name: &str) {
        let mut kill_cmd = self.command();
        kill_cmd.args(["kill", container_name]);
        let _ = run_with_timeout(kill_cmd, CONTROL_TIMEOUT, "docker kill").await;

        let mut rm_cmd = self.command();
        rm_cmd.args(["rm", "-f", container_name]);
        let _ = run_with_timeout(rm_cmd, CONTROL_TIMEOUT, "docker rm").await;
    }
}

async fn inspect(binary: &str, container_name: &str) -> Option<InspectEntry> {
    let mut cmd = Command::new(binary);
    cmd.args(["inspect", container_name]);
    let output = run_with_timeout(cmd, INTROSPECTION_TIMEOUT, "docker inspect").await.ok()?;
    if !output.status.success() {
        return None;
    }
    let entries: Vec<InspectEntry> = serde_json::from_slice(&output.stdout).ok()?;
    entries.into_iter().next()
}

async fn inspect_exit_code(binary: &str, container_name: &str) -> Option<i32> {
    inspect(binary, container_name).await.map(|e| e.state.exit_code as i32)
}

fn parse_stats_line(line: &str) -> Option<ContainerMetrics> {
    #[derive(Deserialize)]
    struct Raw {
        #[serde(rename = "MemUsage")]
        mem_usage: String,
        #[serde(rename = "MemPerc")]
        mem_perc: String,
        #[serde(rename = "CPUPerc")]
        cpu_perc: String,
    }
    let raw: Raw = serde_json::from_str(line).ok()?;

    let (mem_mb, mem_limit_mb) = parse_mem_usage(&raw.mem_usage);
    let mem_pct = raw.mem_perc.trim_end_matches('%').parse().ok();
    let cpu_pct = raw.cpu_perc.trim_end_matches('%').parse().ok();

    Some(ContainerMetrics { mem_mb, mem_limit_mb, mem_pct, cpu_pct })
}

/// Parses Docker's `"123.4MiB / 4GiB"` usage string into megabytes.
fn parse_mem_usage(s: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = s.split('/').map(str::trim);
    let used = parts.next().and_then(parse_byte_size_mb);
    let limit = parts.next().and_then(parse_byte_size_mb);
    (used, limit)
}

fn parse_byte_size_mb(s: &str) -> Option<f64> {
    let (value, unit) = s.split_at(s.find(|c: char| c.is_alphabetic())?);
    let value: f64 = value.parse().ok()?;
    let multiplier = match unit {
        "B" => 1.0 / (1024.0 * 1024.0),
        "KiB" => 1.0 / 1024.0,
        "MiB" => 1.0,
        "GiB" => 1024.0,
        "TiB" => 1024.0 * 1024.0,
        _ => return None,
    };
    Some(value * multiplier)
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
