// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use warden_core::id::{JobId, SessionKey};
use warden_core::{Clock, Job, Session};

use crate::atomic::write_atomic;
use crate::error::StoreError;
use crate::layout::{ensure_dir, Layout};
use crate::store::Store;
use crate::types::{OutputSlice, OutputTail, DEFAULT_READ_LIMIT};

const GET_JOB_RETRIES: u32 = 3;
const GET_JOB_RETRY_BASE_MS: u64 = 50;

/// Unwraps a `spawn_blocking` result, mapping a panicked task to a
/// `StoreError` instead of propagating the panic into this task.
fn join_blocking<T, E: Into<StoreError>>(
    result: Result<Result<T, E>, tokio::task::JoinError>,
) -> Result<T, StoreError> {
    match result {
        Ok(inner) => inner.map_err(Into::into),
        Err(e) => Err(StoreError::TaskPanicked(e.to_string())),
    }
}

/// Filesystem-backed `Store`: one JSON file per session/job record, written
/// via temp-file-then-rename, plus a plain append-only log file per job.
pub struct FsStore {
    layout: Layout,
    clock: Arc<dyn Clock>,
}

impl FsStore {
    pub fn new(layout: Layout, clock: Arc<dyn Clock>) -> Self {
        Self { layout, clock }
    }

    fn read_session_sync(path: &Path) -> Result<Option<Session>, StoreError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_session(&self, key: &SessionKey) -> Result<Option<Session>, StoreError> {
        let path = self.layout.session_file(key);
        let result = tokio::task::spawn_blocking(move || Self::read_session_sync(&path)).await;
        join_blocking(result)
    }

    async fn write_session(&self, session: &Session) -> Result<(), StoreError> {
        let path = self.layout.session_file(&session.session_key);
        let bytes = serde_json::to_vec_pretty(session)?;
        let result = tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await;
        join_blocking(result)?;
        Ok(())
    }

    /// Reads a job record once, with no retry. Used by `update_job`, which
    /// needs a read immediately preceding its own write.
    fn read_job_once(path: &Path) -> Result<Option<Job>, StoreError> {
        match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Err(StoreError::Empty),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_job(&self, key: &SessionKey, job: &Job) -> Result<(), StoreError> {
        let path = self.layout.job_file(key, &job.job_id);
        let bytes = serde_json::to_vec_pretty(job)?;
        let result = tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await;
        join_blocking(result)?;
        Ok(())
    }
}

#[async_trait]
impl Store for FsStore {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, StoreError> {
        self.read_session(key).await
    }

    async fn create_session(&self, key: &SessionKey) -> Result<Session, StoreError> {
        ensure_dir(&self.layout.credentials_dir(key))?;
        ensure_dir(&self.layout.jobs_dir(key))?;
        let session = Session::new(key.clone(), self.clock.now());
        self.write_session(&session).await?;
        Ok(session)
    }

    async fn get_or_create_session(&self, key: &SessionKey) -> Result<Session, StoreError> {
        if let Some(session) = self.read_session(key).await? {
            return Ok(session);
        }
        self.create_session(key).await
    }

    async fn update_session(
        &self,
        key: &SessionKey,
        assistant_session_id: Option<String>,
    ) -> Result<Session, StoreError> {
        let mut session = self
            .read_session(key)
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(key.clone()))?;
        if assistant_session_id.is_some() {
            session.assistant_session_id = assistant_session_id;
        }
        session.message_count += 1;
        session.touch(self.clock.now());
        self.write_session(&session).await?;
        Ok(session)
    }

    async fn set_active_job(
        &self,
        key: &SessionKey,
        job_id: Option<JobId>,
    ) -> Result<(), StoreError> {
        let mut session = self
            .read_session(key)
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(key.clone()))?;

        if let Some(ref new_id) = job_id {
            if let Some(ref existing) = session.active_job_id {
                if existing != new_id {
                    return Err(StoreError::ActiveJobExists(key.clone()));
                }
            }
        }

        session.active_job_id = job_id;
        session.touch(self.clock.now());
        self.write_session(&session).await
    }

    async fn delete_session(&self, key: &SessionKey) {
        let dir = self.layout.session_dir(key);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session = %key, error = %e, "failed to delete session directory");
            }
        }
    }

    async fn delete_workspace(&self, key: &SessionKey) -> Result<(), StoreError> {
        let dir = self.layout.workspace_dir(key);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_sessions(&self) -> Vec<Session> {
        let mut entries = match tokio::fs::read_dir(&self.layout.sessions_dir).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut sessions = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let key = match entry.file_name().into_string() {
                Ok(name) => SessionKey::new(name),
                Err(_) => continue,
            };
            match self.read_session(&key).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!(session = %key, error = %e, "skipping unreadable session"),
            }
        }
        sessions
    }

    async fn cleanup_idle_sessions(&self, idle_cutoff: Duration) -> Vec<SessionKey> {
        let now = self.clock.now();
        let cutoff = match chrono::Duration::from_std(idle_cutoff) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };

        let mut removed = Vec::new();
        for session in self.list_sessions().await {
            if now - session.last_activity >= cutoff {
                self.delete_session(&session.session_key).await;
                removed.push(session.session_key);
            }
        }
        removed
    }

    async fn create_job(
        &self,
        key: &SessionKey,
        prompt: String,
        container_name: String,
    ) -> Result<Job, StoreError> {
        let session = self
            .read_session(key)
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(key.clone()))?;

        if let Some(active_id) = &session.active_job_id {
            if let Some(active) = self.get_job(key, active_id).await? {
                if !active.is_terminal() {
                    return Err(StoreError::ActiveJobExists(key.clone()));
                }
            }
        }

        let job_id = JobId::generate();
        ensure_dir(&self.layout.jobs_dir(key))?;
        let output_path = self.layout.job_output_file(key, &job_id);
        tokio::fs::File::create(&output_path).await?;

        let job = Job::new(
            job_id,
            key.clone(),
            container_name,
            prompt,
            output_path.to_string_lossy().into_owned(),
            self.clock.now(),
        );
        self.write_job(key, &job).await?;
        Ok(job)
    }

    async fn get_job(&self, key: &SessionKey, job_id: &JobId) -> Result<Option<Job>, StoreError> {
        let path = self.layout.job_file(key, job_id);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let read_path = path.clone();
            let result = join_blocking(
                tokio::task::spawn_blocking(move || Self::read_job_once(&read_path)).await,
            );
            match result {
                Ok(job) => return Ok(job),
                Err(_) if attempt < GET_JOB_RETRIES => {
                    tokio::time::sleep(Duration::from_millis(GET_JOB_RETRY_BASE_MS * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn update_job(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        patch: Box<dyn for<'p> FnOnce(&'p mut Job) + Send + 'static>,
    ) -> Result<Job, StoreError> {
        let path = self.layout.job_file(key, job_id);
        let mut job = Self::read_job_once(&path)?.ok_or_else(|| StoreError::JobNotFound(job_id.clone()))?;
        let was_terminal = job.is_terminal();
        patch(&mut job);
        if was_terminal && !job.is_terminal() {
            return Err(StoreError::TerminalRegression(job_id.clone()));
        }
        self.write_job(key, &job).await?;
        Ok(job)
    }

    async fn list_jobs(&self, key: &SessionKey) -> Vec<Job> {
        let mut entries = match tokio::fs::read_dir(self.layout.jobs_dir(key)).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut jobs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            let Some(id_str) = name.strip_suffix(".json") else { continue };
            let job_id = JobId::new(id_str);
            match self.get_job(key, &job_id).await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(e) => tracing::warn!(job = %job_id, error = %e, "skipping unreadable job"),
            }
        }
        jobs
    }

    async fn get_active_job(&self, key: &SessionKey) -> Result<Option<Job>, StoreError> {
        let Some(session) = self.read_session(key).await? else {
            return Ok(None);
        };
        let Some(job_id) = session.active_job_id else {
            return Ok(None);
        };
        self.get_job(key, &job_id).await
    }

    async fn append_job_output(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let path = self.layout.job_output_file(key, job_id);
        let mut file = tokio::fs::OpenOptions::new().append(true).create(true).open(&path).await?;
        file.write_all(bytes).await?;
        Ok(())
    }

    async fn read_job_output(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<OutputSlice, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_READ_LIMIT);
        let path = self.layout.job_output_file(key, job_id);
        let mut file = tokio::fs::File::open(&path).await?;
        let total_size = file.metadata().await?.len();

        if offset >= total_size {
            return Ok(OutputSlice { content: Vec::new(), size: 0, total_size, has_more: false });
        }

        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let to_read = limit.min(total_size - offset);
        let mut buf = vec![0u8; to_read as usize];
        let mut read_total = 0usize;
        while read_total < buf.len() {
            let n = file.read(&mut buf[read_total..]).await?;
            if n == 0 {
                break;
            }
            read_total += n;
        }
        buf.truncate(read_total);

        let has_more = offset + (read_total as u64) < total_size;
        Ok(OutputSlice { size: buf.len() as u64, content: buf, total_size, has_more })
    }

    async fn read_job_output_tail(
        &self,
        key: &SessionKey,
        job_id: &JobId,
        tail_bytes: u64,
    ) -> Result<OutputTail, StoreError> {
        let path = self.layout.job_output_file(key, job_id);
        let mut file = tokio::fs::File::open(&path).await?;
        let metadata = file.metadata().await?;
        let total_size = metadata.len();

        let last_output_seconds_ago = metadata
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .map(|d| d.as_secs() as i64);

        let (start, prefix) = if total_size > tail_bytes {
            (total_size - tail_bytes, true)
        } else {
            (0, false)
        };
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        let tail = if prefix {
            let mut out = b"...".to_vec();
            out.extend_from_slice(&buf);
            out
        } else {
            buf
        };

        Ok(OutputTail { tail, last_output_seconds_ago, total_size })
    }

    async fn materialize_credentials(
        &self,
        key: &SessionKey,
        source_dir: &Path,
    ) -> Result<(), StoreError> {
        let dest = self.layout.credentials_dir(key);
        ensure_dir(&dest)?;
        copy_dir_contents(source_dir, &dest).await?;
        Ok(())
    }

    fn workspace_path(&self, key: &SessionKey) -> PathBuf {
        self.layout.workspace_dir(key)
    }

    fn credentials_path(&self, key: &SessionKey) -> PathBuf {
        self.layout.credentials_dir(key)
    }
}

async fn copy_dir_contents(source: &Path, dest: &Path) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(source).await?;
    while let Some(entry) = entries.next_entry().await? {
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            tokio::fs::create_dir_all(&dest_path).await?;
            Box::pin(copy_dir_contents(&entry.path(), &dest_path)).await?;
        } else if file_type.is_file() {
            tokio::fs::copy(entry.path(), &dest_path).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "fs_store_tests.rs"]
mod tests;
