// SPDX-License-Identifier: MIT

//! Result types returned by the six `Api` operations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use warden_core::{ContainerMetrics, ErrorKind, JobId, JobStatus, SessionKey};

#[derive(Debug, Clone)]
pub struct StartRequest {
    pub prompt: String,
    pub session_key: Option<SessionKey>,
    /// Capability flag from the out-of-scope authentication-discovery
    /// collaborator: true if the caller has credentials to offer.
    pub has_credentials: bool,
    /// Opaque directory the caller's credentials live in, copied verbatim
    /// into the session's credential sink. Ignored if `has_credentials` is
    /// false.
    pub credentials_source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartResult {
    pub job_id: JobId,
    pub session_key: SessionKey,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    Processing,
    Idle,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResult {
    pub job_id: JobId,
    pub session_key: SessionKey,
    pub status: JobStatus,
    pub elapsed_seconds: i64,
    pub output_size: u64,
    pub last_output_seconds_ago: Option<i64>,
    pub activity_state: ActivityState,
    /// Up to 500 bytes of trailing output, UTF-8 lossily decoded.
    pub tail_output: String,
    pub exit_code: Option<i32>,
    pub error: Option<JobError>,
    pub metrics: Option<ContainerMetrics>,
}

#[derive(Debug, Clone)]
pub struct OutputResult {
    pub header: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupResult {
    pub removed: Vec<SessionKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveJobSummary {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_key: SessionKey,
    pub age_seconds: i64,
    pub time_since_active_seconds: i64,
    pub message_count: u64,
    pub active_job: Option<ActiveJobSummary>,
}
