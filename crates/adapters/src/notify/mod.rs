// SPDX-License-Identifier: MIT

//! The `Notifier` port: one-shot, best-effort delivery of a terminal job
//! transition to an external collaborator. The core never retries and never
//! blocks on delivery — callers should treat `notify` as fire-and-forget.

pub mod noop;
pub mod webhook;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use noop::NoopNotifier;
pub use webhook::WebhookNotifier;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifier;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use warden_core::{ErrorKind, JobId, JobStatus, SessionKey};

/// Logical payload for a terminal job transition, per the notification
/// contract. Transport (HTTP method, headers, retries) is the adapter's
/// concern, never the core's.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobNotification {
    pub job_id: JobId,
    pub session_key: SessionKey,
    pub status: JobStatus,
    pub elapsed_seconds: i64,
    pub output_size: u64,
    pub exit_code: Option<i32>,
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    DeliveryFailed(String),
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, payload: JobNotification) -> Result<(), NotifyError>;
}
