// SPDX-License-Identifier: MIT

//! The `Runtime` port: start/stop/inspect detached containers and stream
//! their combined stdout/stderr. The core knows only these operations, never
//! CLI flags or process plumbing — those live in the concrete adapters
//! below.

pub mod docker;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use warden_core::ContainerMetrics;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("container image not available")]
    ImageMissing,
    #[error("failed to start container: {0}")]
    SpawnFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("operation timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct StartOpts {
    pub container_name: String,
    pub image: String,
    pub prompt: String,
    pub workspace_path: PathBuf,
    pub credentials_path: PathBuf,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct StartedContainer {
    pub container_name: String,
    pub container_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ContainerStatus {
    pub running: bool,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ContainerListEntry {
    pub name: String,
    pub running: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// A live handle on a container's combined stdout/stderr, in arrival order.
/// `exit_code` resolves once the stream reader observes EOF; it carries
/// `None` if the container disappeared before a status could be read.
pub struct LogStream {
    pub lines: mpsc::Receiver<String>,
    pub exit_code: oneshot::Receiver<Option<i32>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetLogsOptions {
    pub tail_lines: Option<u32>,
}

#[async_trait]
pub trait Runtime: Send + Sync + 'static {
    async fn check_image(&self, image: &str) -> bool;
    async fn start_detached(&self, opts: StartOpts) -> Result<StartedContainer, RuntimeError>;
    /// Suspends until the caller drops the returned stream or the container
    /// exits. The container's exit code resolves on the paired channel.
    async fn stream_logs(&self, container_name: &str) -> Result<LogStream, RuntimeError>;
    async fn get_logs(&self, container_name: &str, opts: GetLogsOptions) -> Option<Vec<u8>>;
    async fn get_status(&self, container_name: &str) -> Option<ContainerStatus>;
    async fn get_stats(&self, container_name: &str) -> Option<ContainerMetrics>;
    async fn list_by_prefix(&self, prefix: &str) -> Vec<ContainerListEntry>;
    /// Idempotent; never errors — best-effort kill-and-remove.
    async fn kill(&self, container_name: &str);
}
