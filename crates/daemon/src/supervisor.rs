// SPDX-License-Identifier: MIT

//! The `JobSupervisor`: owns the six `API` operations (start, status,
//! output, cancel, cleanup, sessions), the job lifecycle, and the watcher it
//! spawns per running job.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use warden_adapters::{GetLogsOptions, JobNotification, Notifier, Runtime, StartOpts};
use warden_core::{
    container_name_from_session_key, ApiError, Clock, ErrorKind, Job, JobId, JobStatus, Session,
    SessionKey,
};
use warden_storage::{Store, StoreError};

use crate::config::Config;
use crate::types::{
    ActiveJobSummary, ActivityState, CleanupResult, JobError, OutputResult, SessionSummary,
    StartRequest, StartResult, StatusResult,
};
use crate::watcher::{self, WatcherDeps};

const ACTIVE_WINDOW_SECS: i64 = 10;
const PROCESSING_CPU_PCT: f64 = 20.0;
const TAIL_OUTPUT_BYTES: u64 = 500;

pub struct JobSupervisor {
    store: Arc<dyn Store>,
    runtime: Arc<dyn Runtime>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl JobSupervisor {
    pub fn new(
        store: Arc<dyn Store>,
        runtime: Arc<dyn Runtime>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self { store, runtime, notifier, clock, config }
    }

    fn watcher_deps(&self) -> WatcherDeps {
        WatcherDeps {
            store: self.store.clone(),
            runtime: self.runtime.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
            startup_timeout: self.config.startup_timeout,
            output_idle_timeout: self.config.output_idle_timeout,
        }
    }

    pub async fn start(&self, request: StartRequest) -> Result<StartResult, ApiError> {
        if request.prompt.trim().is_empty() {
            return Err(ApiError::MissingParameter("prompt"));
        }
        if !request.has_credentials {
            return Err(ApiError::MissingAuthentication);
        }
        if !self.runtime.check_image(&self.config.image).await {
            return Err(ApiError::MissingImage);
        }

        let session_key = request.session_key.unwrap_or_else(|| SessionKey::new(Uuid::new_v4().to_string()));
        let session = self.store.get_or_create_session(&session_key).await.map_err(store_err)?;
        if session.active_job_id.is_some() {
            return Err(ApiError::ActiveJobExists(session_key.into_string()));
        }

        if let Some(source) = &request.credentials_source {
            self.store.materialize_credentials(&session_key, source).await.map_err(store_err)?;
        }

        let container_name = container_name_from_session_key(&session_key);
        let job = self.store.create_job(&session_key, request.prompt, container_name.clone()).await.map_err(store_err)?;

        let started = self
            .runtime
            .start_detached(StartOpts {
                container_name: container_name.clone(),
                image: self.config.image.clone(),
                prompt: job.prompt.clone(),
                workspace_path: self.store.workspace_path(&session_key),
                credentials_path: self.store.credentials_path(&session_key),
                env: Vec::new(),
            })
            .await;

        let started = match started {
            Ok(started) => started,
            Err(e) => {
                let now = self.clock.now();
                let message = e.to_string();
                let _ = self
                    .store
                    .update_job(
                        &session_key,
                        &job.job_id,
                        Box::new(move |job: &mut Job| {
                            let _ = job.transition_terminal(
                                JobStatus::Failed,
                                now,
                                None,
                                Some(ErrorKind::SpawnFailed),
                                Some(message),
                            );
                        }),
                    )
                    .await;
                return Err(ApiError::SpawnFailed(e.to_string()));
            }
        };

        let now = self.clock.now();
        self.store
            .update_job(
                &session_key,
                &job.job_id,
                Box::new(move |job: &mut Job| {
                    job.status = JobStatus::Running;
                    job.started_at = Some(now);
                }),
            )
            .await
            .map_err(store_err)?;
        self.store.set_active_job(&session_key, Some(job.job_id.clone())).await.map_err(store_err)?;

        watcher::spawn_watcher(self.watcher_deps(), session_key.clone(), job.job_id.clone(), started.container_name);

        Ok(StartResult { job_id: job.job_id, session_key, status: JobStatus::Running })
    }

    pub async fn status(&self, job_id: &JobId, session_key: Option<SessionKey>) -> Result<StatusResult, ApiError> {
        let (session_key, mut job) = self.resolve(job_id, session_key).await?;

        if job.status == JobStatus::Running {
            job = self.reconcile_running(&session_key, job).await?;
        }

        let now = self.clock.now();
        let elapsed_seconds = job
            .started_at
            .or(Some(job.created_at))
            .map(|start| (job.completed_at.unwrap_or(now) - start).num_seconds())
            .unwrap_or(0);

        let tail = self.store.read_job_output_tail(&session_key, job_id, TAIL_OUTPUT_BYTES).await.map_err(store_err)?;
        let cpu_pct = job.metrics.and_then(|m| m.cpu_pct);
        let activity_state = if tail.last_output_seconds_ago.is_some_and(|secs| secs < ACTIVE_WINDOW_SECS) {
            ActivityState::Active
        } else if cpu_pct.is_some_and(|pct| pct > PROCESSING_CPU_PCT) {
            ActivityState::Processing
        } else {
            ActivityState::Idle
        };

        Ok(StatusResult {
            job_id: job.job_id,
            session_key,
            status: job.status,
            elapsed_seconds,
            output_size: tail.total_size,
            last_output_seconds_ago: tail.last_output_seconds_ago,
            activity_state,
            tail_output: String::from_utf8_lossy(&tail.tail).into_owned(),
            exit_code: job.exit_code,
            error: job.error_kind.map(|kind| JobError { kind, message: job.error_message }),
            metrics: job.metrics,
        })
    }

    /// Best-effort self-heal: if a `running` job's watcher has died, the
    /// status call observes the runtime directly and classifies the job
    /// itself. No notification is emitted — the original watcher that would
    /// have sent one is, by definition, gone.
    async fn reconcile_running(&self, session_key: &SessionKey, job: Job) -> Result<Job, ApiError> {
        let Some(container_status) = self.runtime.get_status(&job.container_name).await else {
            return Ok(job);
        };
        if container_status.running {
            let metrics = self.runtime.get_stats(&job.container_name).await;
            if let Some(metrics) = metrics {
                let job_id = job.job_id.clone();
                return self
                    .store
                    .update_job(
                        session_key,
                        &job_id,
                        Box::new(move |job: &mut Job| job.metrics = Some(metrics)),
                    )
                    .await
                    .map_err(store_err);
            }
            return Ok(job);
        }

        let log_text = self
            .runtime
            .get_logs(&job.container_name, GetLogsOptions::default())
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let now = self.clock.now();
        let (status, error_kind, error_message) =
            watcher::classify_from_logs(container_status.exit_code, &log_text, now);
        let exit_code = container_status.exit_code;

        let job_id = job.job_id.clone();
        let updated = self
            .store
            .update_job(
                session_key,
                &job_id,
                Box::new(move |job: &mut Job| {
                    let _ = job.transition_terminal(status, now, exit_code, error_kind, error_message);
                }),
            )
            .await
            .map_err(store_err)?;
        self.store.set_active_job(session_key, None).await.map_err(store_err)?;
        Ok(updated)
    }

    pub async fn output(
        &self,
        job_id: &JobId,
        session_key: Option<SessionKey>,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<OutputResult, ApiError> {
        let (session_key, job) = self.resolve(job_id, session_key).await?;
        let slice = self.store.read_job_output(&session_key, job_id, offset, limit).await.map_err(store_err)?;
        let header = format!(
            "job {job_id} status={status} bytes={start}-{end}/{total} more={more}\n",
            job_id = job_id,
            status = job.status_text(),
            start = offset,
            end = offset + slice.size,
            total = slice.total_size,
            more = slice.has_more,
        );
        Ok(OutputResult { header, bytes: slice.content })
    }

    pub async fn cancel(&self, job_id: &JobId, session_key: Option<SessionKey>) -> Result<String, ApiError> {
        let (session_key, job) = self.resolve(job_id, session_key).await?;
        if job.is_terminal() {
            return Ok(format!("job {job_id} already {status}", status = job.status_text()));
        }

        self.runtime.kill(&job.container_name).await;

        let now = self.clock.now();
        let job_id_owned = job.job_id.clone();
        let updated = self
            .store
            .update_job(
                &session_key,
                &job_id_owned,
                Box::new(move |job: &mut Job| {
                    let _ = job.transition_terminal(JobStatus::Cancelled, now, None, None, None);
                }),
            )
            .await
            .map_err(store_err)?;
        self.store.set_active_job(&session_key, None).await.map_err(store_err)?;

        let output_size = self
            .store
            .read_job_output_tail(&session_key, job_id, 0)
            .await
            .map(|t| t.total_size)
            .unwrap_or(updated.output_size);
        let elapsed_seconds = updated
            .started_at
            .or(Some(updated.created_at))
            .map(|start| (now - start).num_seconds())
            .unwrap_or(0);

        let payload = JobNotification {
            job_id: updated.job_id.clone(),
            session_key,
            status: updated.status,
            elapsed_seconds,
            output_size,
            exit_code: updated.exit_code,
            error_kind: updated.error_kind,
        };
        if let Err(e) = self.notifier.notify(payload).await {
            tracing::warn!(job = %job_id, error = %e, "cancellation notification failed");
        }

        Ok(format!("job {job_id} cancelled"))
    }

    pub async fn cleanup(&self, delete_workspaces: bool) -> Result<CleanupResult, ApiError> {
        let removed = self.store.cleanup_idle_sessions(self.config.session_idle_timeout).await;
        if delete_workspaces {
            for key in &removed {
                if let Err(e) = self.store.delete_workspace(key).await {
                    tracing::warn!(session = %key, error = %e, "failed to delete workspace during cleanup");
                }
            }
        }
        Ok(CleanupResult { removed })
    }

    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let now = self.clock.now();
        let sessions = self.store.list_sessions().await;
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(self.summarize(session, now).await);
        }
        summaries
    }

    async fn summarize(&self, session: Session, now: chrono::DateTime<Utc>) -> SessionSummary {
        let active_job = match session.active_job_id.clone() {
            Some(job_id) => match self.store.get_job(&session.session_key, &job_id).await {
                Ok(Some(job)) => Some(ActiveJobSummary { job_id: job.job_id, status: job.status }),
                _ => None,
            },
            None => None,
        };
        SessionSummary {
            session_key: session.session_key,
            age_seconds: (now - session.created_at).num_seconds(),
            time_since_active_seconds: (now - session.last_activity).num_seconds(),
            message_count: session.message_count,
            active_job,
        }
    }

    /// Resolves a job by id, optionally scoped to a session key. If absent,
    /// performs a linear scan over sessions — acceptable per the
    /// concurrency model, which bounds the set to active users.
    async fn resolve(&self, job_id: &JobId, session_key: Option<SessionKey>) -> Result<(SessionKey, Job), ApiError> {
        if let Some(key) = session_key {
            let job = self.store.get_job(&key, job_id).await.map_err(store_err)?;
            return job.map(|job| (key, job)).ok_or_else(|| ApiError::JobNotFound(job_id.to_string()));
        }
        for session in self.store.list_sessions().await {
            if let Ok(Some(job)) = self.store.get_job(&session.session_key, job_id).await {
                return Ok((session.session_key, job));
            }
        }
        Err(ApiError::JobNotFound(job_id.to_string()))
    }
}

fn store_err(e: StoreError) -> ApiError {
    match e {
        StoreError::SessionNotFound(key) => ApiError::SessionNotFound(key.into_string()),
        StoreError::JobNotFound(id) => ApiError::JobNotFound(id.into_string()),
        StoreError::ActiveJobExists(key) => ApiError::ActiveJobExists(key.into_string()),
        other => ApiError::Store(other.to_string()),
    }
}

trait JobStatusText {
    fn status_text(&self) -> &'static str;
}

impl JobStatusText for Job {
    fn status_text(&self) -> &'static str {
        match self.status {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
