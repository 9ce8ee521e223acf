// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use warden_core::id::{JobId, SessionKey};
use warden_core::{Job, Session};

use crate::error::StoreError;
use crate::types::{OutputSlice, OutputTail};

/// Durable, atomic persistence of sessions, jobs, and their append-only
/// output logs. Implementations must honor the on-disk layout and
/// concurrency-safety rules this supervisor relies on: atomic rename for
/// job/session records, plain append for output logs, tolerant retries on
/// transient empty/partial reads.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, StoreError>;
    async fn create_session(&self, key: &SessionKey) -> Result<Session, StoreError>;
    async fn get_or_create_session(&self, key: &SessionKey) -> Result<Session, StoreError>;
    async fn update_session(
        &self,
        key: &SessionKey,
        assistant_session_id: Option<String>,
    ) -> Result<Session, StoreError>;
    async fn set_active_job(
        &self,
        key: &SessionKey,
        job_id: Option<JobId>,
    ) -> Result<(), StoreError>;
    async fn delete_session(&self, key: &SessionKey);
    async fn delete_workspace(&self, key: &SessionKey) -> Result<(), StoreError>;
    async fn list_sessions(&self) -> Vec<Session>;
    async fn cleanup_idle_sessions(&self, idle_cutoff: Duration) -> Vec<SessionKey>;

    async fn create_job(
        &self,
        key: &SessionKey,
        prompt: String,
        container_name: String,
    ) -> Result<Job, StoreError>;
    async fn get_job(&self, key: &SessionKey, job_id: &JobId) -> Result<Option<Job>, StoreError>;
    /// Atomically reads the current record, applies `patch`, and rewrites it
    /// via temp-file-then-rename. Rejects (without writing) a patch that
    /// would move a terminal job back to a non-terminal status.
    async fn update_job(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        patch: Box<dyn for<'p> FnOnce(&'p mut Job) + Send + 'static>,
    ) -> Result<Job, StoreError>;
    async fn list_jobs(&self, key: &SessionKey) -> Vec<Job>;
    async fn get_active_job(&self, key: &SessionKey) -> Result<Option<Job>, StoreError>;

    async fn append_job_output(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        bytes: &[u8],
    ) -> Result<(), StoreError>;
    async fn read_job_output(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<OutputSlice, StoreError>;
    async fn read_job_output_tail(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        tail_bytes: u64,
    ) -> Result<OutputTail, StoreError>;

    async fn materialize_credentials(
        &self,
        key: &SessionKey,
        source_dir: &Path,
    ) -> Result<(), StoreError>;
    fn workspace_path(&self, key: &SessionKey) -> PathBuf;
    fn credentials_path(&self, key: &SessionKey) -> PathBuf;
}
