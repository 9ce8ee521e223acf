// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{JobId, SessionKey};

/// A caller-named, persistent envelope for a sequence of one-job-at-a-time
/// interactions with the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_key: SessionKey,
    /// Opaque handle returned by the assistant for resume; absent until the
    /// first job reports one back.
    pub assistant_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
    pub active_job_id: Option<JobId>,
}

impl Session {
    pub fn new(session_key: SessionKey, now: DateTime<Utc>) -> Self {
        Self {
            session_key,
            assistant_session_id: None,
            created_at: now,
            last_activity: now,
            message_count: 0,
            active_job_id: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
