// SPDX-License-Identifier: MIT

//! One-shot start-up pass that reconciles persisted job state against actual
//! container state, recovering from a daemon restart while a job's watcher
//! was mid-flight.

use std::sync::Arc;

use warden_adapters::{ContainerListEntry, GetLogsOptions, Runtime};
use warden_core::{parse_line, session_key_from_container_name, Clock, Job, StreamEvent};
use warden_storage::Store;

use crate::watcher;

const CONTAINER_PREFIX: &str = "claude-";

pub struct OrphanReconciler {
    store: Arc<dyn Store>,
    runtime: Arc<dyn Runtime>,
    clock: Arc<dyn Clock>,
}

impl OrphanReconciler {
    pub fn new(store: Arc<dyn Store>, runtime: Arc<dyn Runtime>, clock: Arc<dyn Clock>) -> Self {
        Self { store, runtime, clock }
    }

    /// Runs exactly once. Best-effort throughout: a failure reconciling one
    /// container is logged and does not block the rest — the normal status
    /// path heals eventually.
    pub async fn run(&self) {
        let containers = self.runtime.list_by_prefix(CONTAINER_PREFIX).await;
        for entry in containers {
            if let Err(e) = self.reconcile_one(&entry).await {
                tracing::warn!(container = %entry.name, error = %e, "orphan reconciliation failed for container");
            }
        }
    }

    async fn reconcile_one(&self, entry: &ContainerListEntry) -> Result<(), warden_storage::StoreError> {
        let Some(session_key) = session_key_from_container_name(&entry.name) else {
            // Not one of ours.
            return Ok(());
        };

        let active = self.store.get_active_job(&session_key).await?;
        let Some(job) = active else {
            tracing::info!(container = %entry.name, "removing orphaned container with no active job");
            self.runtime.kill(&entry.name).await;
            return Ok(());
        };

        if entry.running {
            // The normal watcher-or-status path will handle it.
            return Ok(());
        }

        let status = self.runtime.get_status(&entry.name).await;
        let exit_code = status.and_then(|s| s.exit_code);
        let log_bytes = self.runtime.get_logs(&entry.name, GetLogsOptions::default()).await.unwrap_or_default();
        let log_text = String::from_utf8_lossy(&log_bytes).into_owned();

        let now = self.clock.now();
        for line in log_text.lines() {
            for event in parse_line(line, now) {
                if let StreamEvent::TextFragment { text, .. } = event {
                    let _ = self.store.append_job_output(&session_key, &job.job_id, text.as_bytes()).await;
                }
            }
        }

        let (status, error_kind, error_message) = watcher::classify_from_logs(exit_code, &log_text, now);
        let job_id = job.job_id.clone();
        self.store
            .update_job(
                &session_key,
                &job_id,
                Box::new(move |job: &mut Job| {
                    let _ = job.transition_terminal(status, now, exit_code, error_kind, error_message);
                }),
            )
            .await?;
        self.store.set_active_job(&session_key, None).await?;
        self.runtime.kill(&entry.name).await;

        tracing::info!(container = %entry.name, status = ?status, "reconciled orphaned job on start-up");
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
