// SPDX-License-Identifier: MIT

//! Deterministic in-memory `Runtime` for tests. Scripts are registered
//! per container name before the supervisor touches them; `stream_logs`
//! replays the scripted lines and exit code instead of talking to Docker.
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use warden_core::ContainerMetrics;

use super::{
    ContainerListEntry, ContainerStatus, GetLogsOptions, LogStream, Runtime, RuntimeError,
    StartOpts, StartedContainer,
};

/// A pre-scripted container: the lines `stream_logs` will emit and the exit
/// code it resolves with. `running` reflects `get_status`/`list_by_prefix`
/// after the script has finished and before `kill` is called.
#[derive(Debug, Clone, Default)]
pub struct ScriptedContainer {
    pub lines: Vec<String>,
    pub exit_code: Option<i32>,
    /// If true, `stream_logs` never terminates on its own (simulates a
    /// container the watcher is still waiting on at test-inspection time).
    pub hangs: bool,
}

struct ContainerRecord {
    script: ScriptedContainer,
    killed: bool,
    started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
struct State {
    containers: HashMap<String, ContainerRecord>,
    image_available: bool,
    spawn_error: Option<String>,
    stats: HashMap<String, ContainerMetrics>,
}

/// A fake `Runtime` driven entirely by in-process state, for watcher and
/// reconciler tests that must not depend on a real container engine.
#[derive(Clone)]
pub struct FakeRuntime {
    state: Arc<Mutex<State>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(State { image_available: true, ..State::default() })) }
    }

    pub fn set_image_available(&self, available: bool) {
        self.state.lock().image_available = available;
    }

    /// Makes the next `start_detached` call fail with `message`.
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.state.lock().spawn_error = Some(message.into());
    }

    /// Registers (or overwrites) a container's script before `start_detached`
    /// or `list_by_prefix` discovers it. Used both for containers the fake
    /// "starts" and for pre-seeded orphans the reconciler finds at startup.
    pub fn seed_container(&self, name: impl Into<String>, script: ScriptedContainer) {
        let mut state = self.state.lock();
        state.containers.insert(
            name.into(),
            ContainerRecord { script, killed: false, started_at: chrono::Utc::now() },
        );
    }

    pub fn set_stats(&self, name: impl Into<String>, metrics: ContainerMetrics) {
        self.state.lock().stats.insert(name.into(), metrics);
    }

    pub fn was_killed(&self, name: &str) -> bool {
        self.state.lock().containers.get(name).map(|c| c.killed).unwrap_or(false)
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state.lock().containers.keys().cloned().collect()
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    async fn check_image(&self, _image: &str) -> bool {
        self.state.lock().image_available
    }

    async fn start_detached(&self, opts: StartOpts) -> Result<StartedContainer, RuntimeError> {
        let mut state = self.state.lock();
        if let Some(message) = state.spawn_error.take() {
            return Err(RuntimeError::SpawnFailed(message));
        }
        state.containers.entry(opts.container_name.clone()).or_insert_with(|| ContainerRecord {
            script: ScriptedContainer::default(),
            killed: false,
            started_at: chrono::Utc::now(),
        });
        Ok(StartedContainer {
            container_id: format!("fake-{}", opts.container_name),
            container_name: opts.container_name,
        })
    }

    async fn stream_logs(&self, container_name: &str) -> Result<LogStream, RuntimeError> {
        let record = {
            let state = self.state.lock();
            state
                .containers
                .get(container_name)
                .map(|c| c.script.clone())
                .ok_or_else(|| RuntimeError::Transport(format!("no such container: {container_name}")))?
        };

        let (line_tx, line_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();

        tokio::spawn(async move {
            for line in record.lines {
                if line_tx.send(line).await.is_err() {
                    return;
                }
            }
            if record.hangs {
                // Never resolve exit_code; the channel is simply dropped
                // when the test ends, which the watcher treats as EOF.
                std::future::pending::<()>().await;
                return;
            }
            let _ = exit_tx.send(record.exit_code);
        });

        Ok(LogStream { lines: line_rx, exit_code: exit_rx })
    }

    async fn get_logs(&self, container_name: &str, opts: GetLogsOptions) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let record = state.containers.get(container_name)?;
        let lines: Vec<&String> = match opts.tail_lines {
            Some(n) => record.script.lines.iter().rev().take(n as usize).collect::<Vec<_>>(),
            None => record.script.lines.iter().collect(),
        };
        let mut lines: Vec<&String> = lines;
        if opts.tail_lines.is_some() {
            lines.reverse();
        }
        let joined = lines.into_iter().cloned().collect::<Vec<_>>().join("\n");
        Some(joined.into_bytes())
    }

    async fn get_status(&self, container_name: &str) -> Option<ContainerStatus> {
        let state = self.state.lock();
        let record = state.containers.get(container_name)?;
        let running = !record.killed && record.script.hangs;
        Some(ContainerStatus {
            running,
            exit_code: (!running).then_some(record.script.exit_code.unwrap_or(0)),
            started_at: Some(record.started_at),
            finished_at: (!running).then(chrono::Utc::now),
        })
    }

    async fn get_stats(&self, container_name: &str) -> Option<ContainerMetrics> {
        self.state.lock().stats.get(container_name).copied()
    }

    async fn list_by_prefix(&self, prefix: &str) -> Vec<ContainerListEntry> {
        let state = self.state.lock();
        state
            .containers
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, record)| ContainerListEntry {
                name: name.clone(),
                running: !record.killed && record.script.hangs,
                created_at: Some(record.started_at),
            })
            .collect()
    }

    async fn kill(&self, container_name: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.containers.get_mut(container_name) {
            record.killed = true;
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
