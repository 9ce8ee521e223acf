// SPDX-License-Identifier: MIT

//! The per-job watcher: one concurrent unit per `running` job, spawned by
//! `JobSupervisor::start` and never addressed again directly — it owns a
//! job's observation, parsing, and terminal classification end to end.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use warden_adapters::{JobNotification, Notifier, Runtime};
use warden_core::{
    parse_line, AuthErrorKind, Clock, ErrorKind, Job, JobId, JobStatus, SessionKey, StreamEvent,
};
use warden_storage::Store;

/// Shared, cloneable handles the watcher (and the reconciler) need. Held as
/// trait objects: the supervisor owns its collaborators by interface, never
/// by concrete type, per the port design.
#[derive(Clone)]
pub struct WatcherDeps {
    pub store: Arc<dyn Store>,
    pub runtime: Arc<dyn Runtime>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub startup_timeout: Duration,
    pub output_idle_timeout: Duration,
}

/// A parser- or runtime-observed event that forces a terminal classification
/// regardless of (or overriding) the container's own exit code.
#[derive(Debug, Clone)]
enum TerminalSignal {
    RateLimit { reset_time: String, wait_minutes: i64 },
    Auth(AuthErrorKind),
    Timeout { during_startup: bool },
    TransportFailure,
}

/// Spawns the watcher as a detached background task. Returns immediately;
/// the task outlives the caller and persists the job's terminal state
/// itself — nothing here is awaited by `start`.
pub fn spawn_watcher(deps: WatcherDeps, session_key: SessionKey, job_id: JobId, container_name: String) {
    tokio::spawn(async move {
        let (exit_code, signal) = watch_stream(&deps, &session_key, &job_id, &container_name).await;
        finalize(&deps, &session_key, &job_id, exit_code, signal).await;
    });
}

/// Opens the log stream, retrying once on transport failure before giving
/// up and classifying the job as a crash.
async fn watch_stream(
    deps: &WatcherDeps,
    session_key: &SessionKey,
    job_id: &JobId,
    container_name: &str,
) -> (Option<i32>, Option<TerminalSignal>) {
    for attempt in 0..2 {
        match deps.runtime.stream_logs(container_name).await {
            Ok(stream) => return drain_stream(deps, session_key, job_id, container_name, stream).await,
            Err(e) => {
                tracing::warn!(container = %container_name, attempt, error = %e, "log stream open failed");
            }
        }
    }
    (Some(0), Some(TerminalSignal::TransportFailure))
}

/// Reads lines until EOF, appending text fragments to the output log and
/// latching the last-seen terminal signal (rate-limit/auth overwrite-last-wins,
/// per the watcher protocol). Also enforces the startup/idle output timeouts.
async fn drain_stream(
    deps: &WatcherDeps,
    session_key: &SessionKey,
    job_id: &JobId,
    container_name: &str,
    mut stream: warden_adapters::LogStream,
) -> (Option<i32>, Option<TerminalSignal>) {
    let mut signal = None;
    let mut saw_output = false;

    loop {
        let window = if saw_output { deps.output_idle_timeout } else { deps.startup_timeout };
        match tokio::time::timeout(window, stream.lines.recv()).await {
            Ok(Some(line)) => {
                saw_output = true;
                let now = deps.clock.now();
                for event in parse_line(&line, now) {
                    match event {
                        StreamEvent::TextFragment { text, .. } => {
                            // Fire-and-forget: this watcher is the output
                            // log's sole writer, so lost ordering against
                            // other writers cannot happen.
                            let _ = deps.store.append_job_output(session_key, job_id, text.as_bytes()).await;
                        }
                        StreamEvent::RateLimit { reset_time, wait_minutes, .. } => {
                            signal = Some(TerminalSignal::RateLimit { reset_time, wait_minutes });
                        }
                        StreamEvent::AuthError { kind, .. } => {
                            signal = Some(TerminalSignal::Auth(kind));
                        }
                    }
                }
            }
            Ok(None) => {
                let exit_code = stream.exit_code.await.ok().flatten();
                return (exit_code, signal);
            }
            Err(_elapsed) => {
                deps.runtime.kill(container_name).await;
                return (None, Some(TerminalSignal::Timeout { during_startup: !saw_output }));
            }
        }
    }
}

fn classify(exit_code: Option<i32>, signal: Option<TerminalSignal>) -> (JobStatus, Option<ErrorKind>, Option<String>) {
    match signal {
        Some(TerminalSignal::RateLimit { reset_time, wait_minutes }) => (
            JobStatus::Failed,
            Some(ErrorKind::RateLimit),
            Some(format!("rate limit hit; wait {wait_minutes} minutes (resets at {reset_time})")),
        ),
        Some(TerminalSignal::Auth(AuthErrorKind::TokenExpired)) => (
            JobStatus::Failed,
            Some(ErrorKind::AuthTokenExpired),
            Some("OAuth token has expired".to_string()),
        ),
        Some(TerminalSignal::Auth(AuthErrorKind::AuthenticationFailed)) => (
            JobStatus::Failed,
            Some(ErrorKind::AuthFailed),
            Some("authentication failed".to_string()),
        ),
        Some(TerminalSignal::Timeout { during_startup: true }) => (
            JobStatus::Failed,
            Some(ErrorKind::StartupTimeout),
            Some("no output observed within the startup window".to_string()),
        ),
        Some(TerminalSignal::Timeout { during_startup: false }) => (
            JobStatus::Failed,
            Some(ErrorKind::IdleTimeout),
            Some("no output observed within the idle window".to_string()),
        ),
        Some(TerminalSignal::TransportFailure) => (
            JobStatus::Failed,
            Some(ErrorKind::Crash),
            Some("failed to stream container logs".to_string()),
        ),
        None => match exit_code {
            Some(0) => (JobStatus::Completed, None, None),
            Some(137) => (
                JobStatus::Failed,
                Some(ErrorKind::Oom),
                Some("container exited with code 137 (out of memory)".to_string()),
            ),
            Some(code) => (
                JobStatus::Failed,
                Some(ErrorKind::Crash),
                Some(format!("container exited with code {code}")),
            ),
            None => (
                JobStatus::Failed,
                Some(ErrorKind::Crash),
                Some("container disappeared; exit code unknown".to_string()),
            ),
        },
    }
}

/// Scans already-captured log text for a terminal signal (rate-limit/auth),
/// the same per-line detectors the live watcher applies, then classifies
/// using the container's exit code. Used by the self-healing status path
/// and the orphan reconciler, which observe a stopped container after the
/// fact rather than while it is streaming.
pub(crate) fn classify_from_logs(
    exit_code: Option<i32>,
    log_text: &str,
    now: DateTime<Utc>,
) -> (JobStatus, Option<ErrorKind>, Option<String>) {
    let mut signal = None;
    for line in log_text.lines() {
        for event in parse_line(line, now) {
            match event {
                StreamEvent::RateLimit { reset_time, wait_minutes, .. } => {
                    signal = Some(TerminalSignal::RateLimit { reset_time, wait_minutes });
                }
                StreamEvent::AuthError { kind, .. } => {
                    signal = Some(TerminalSignal::Auth(kind));
                }
                StreamEvent::TextFragment { .. } => {}
            }
        }
    }
    classify(exit_code, signal)
}

async fn finalize(
    deps: &WatcherDeps,
    session_key: &SessionKey,
    job_id: &JobId,
    exit_code: Option<i32>,
    signal: Option<TerminalSignal>,
) {
    let current = match deps.store.get_job(session_key, job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(job = %job_id, error = %e, "watcher could not read job before finalizing");
            return;
        }
    };
    if current.status != JobStatus::Running {
        // Cancel raced us; the job already carries its own terminal record.
        return;
    }

    let (status, error_kind, error_message) = classify(exit_code, signal);
    let now = deps.clock.now();

    let updated = deps
        .store
        .update_job(
            session_key,
            job_id,
            Box::new(move |job: &mut Job| {
                let _ = job.transition_terminal(status, now, exit_code, error_kind, error_message);
            }),
        )
        .await;

    let Ok(job) = updated else {
        tracing::warn!(job = %job_id, "watcher failed to persist terminal status");
        return;
    };

    if let Err(e) = deps.store.set_active_job(session_key, None).await {
        tracing::warn!(session = %session_key, error = %e, "watcher failed to clear active job");
    }

    let output_size = deps
        .store
        .read_job_output_tail(session_key, job_id, 0)
        .await
        .map(|t| t.total_size)
        .unwrap_or(job.output_size);

    let elapsed_seconds = job
        .started_at
        .or(Some(job.created_at))
        .map(|start| (now - start).num_seconds())
        .unwrap_or(0);

    let payload = JobNotification {
        job_id: job.job_id.clone(),
        session_key: session_key.clone(),
        status: job.status,
        elapsed_seconds,
        output_size,
        exit_code: job.exit_code,
        error_kind: job.error_kind,
    };

    if let Err(e) = deps.notifier.notify(payload).await {
        tracing::warn!(job = %job_id, error = %e, "completion notification failed");
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
