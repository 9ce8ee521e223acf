// SPDX-License-Identifier: MIT

//! `Notifier` that discards every payload. Used when no webhook URL is
//! configured: the watcher and supervisor still call `notify` unconditionally,
//! so there is always a concrete notifier to hand them.

use async_trait::async_trait;

use super::{JobNotification, NotifyError, Notifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _payload: JobNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{JobId, JobStatus, SessionKey};

    #[tokio::test]
    async fn always_succeeds() {
        let notifier = NoopNotifier;
        let payload = JobNotification {
            job_id: JobId::new("j"),
            session_key: SessionKey::new("s"),
            status: JobStatus::Completed,
            elapsed_seconds: 1,
            output_size: 0,
            exit_code: Some(0),
            error_kind: None,
        };
        assert!(notifier.notify(payload).await.is_ok());
    }
}
