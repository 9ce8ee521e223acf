// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::id::{JobId, SessionKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// A snapshot of container resource usage, as last observed by the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub mem_mb: Option<f64>,
    pub mem_limit_mb: Option<f64>,
    pub mem_pct: Option<f64>,
    pub cpu_pct: Option<f64>,
}

/// A single, bounded execution of a prompt in a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub session_key: SessionKey,
    pub container_name: String,
    pub status: JobStatus,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub output_file: String,
    #[serde(default)]
    pub output_size: u64,
    #[serde(default)]
    pub output_truncated: bool,
    pub metrics: Option<ContainerMetrics>,
    pub last_output_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        job_id: JobId,
        session_key: SessionKey,
        container_name: String,
        prompt: String,
        output_file: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            session_key,
            container_name,
            status: JobStatus::Pending,
            prompt,
            created_at: now,
            started_at: None,
            completed_at: None,
            exit_code: None,
            error_kind: None,
            error_message: None,
            output_file,
            output_size: 0,
            output_truncated: false,
            metrics: None,
            last_output_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the job to a terminal status, setting the terminal fields
    /// atomically with it. Returns an error if the job is already terminal
    /// with a *different* kind, which would violate §5's monotonicity rule
    /// (terminal → non-terminal is forbidden; terminal → same-kind terminal
    /// is tolerated as a late, harmless re-write).
    pub fn transition_terminal(
        &mut self,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        exit_code: Option<i32>,
        error_kind: Option<ErrorKind>,
        error_message: Option<String>,
    ) -> Result<(), TerminalTransitionError> {
        if !status.is_terminal() {
            return Err(TerminalTransitionError::NotTerminal);
        }
        if self.is_terminal() && self.status != status {
            return Err(TerminalTransitionError::AlreadyTerminal(self.status));
        }
        self.status = status;
        self.completed_at = Some(completed_at);
        self.exit_code = exit_code;
        self.error_kind = error_kind;
        self.error_message = error_message;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TerminalTransitionError {
    #[error("target status is not terminal")]
    NotTerminal,
    #[error("job is already terminal as {0:?}")]
    AlreadyTerminal(JobStatus),
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
