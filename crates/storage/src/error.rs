// SPDX-License-Identifier: MIT

use warden_core::id::{JobId, SessionKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionNotFound(SessionKey),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("session {0} already has an active job")]
    ActiveJobExists(SessionKey),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("record was empty or partially written")]
    Empty,

    #[error("job {0} is already terminal; refusing to revert it to a non-terminal status")]
    TerminalRegression(JobId),

    #[error("background storage task panicked: {0}")]
    TaskPanicked(String),
}
