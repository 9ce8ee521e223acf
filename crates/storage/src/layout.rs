// SPDX-License-Identifier: MIT

//! On-disk layout:
//!
//! ```text
//! <sessionsDir>/<sessionKey>/session.json
//! <sessionsDir>/<sessionKey>/.claude/              # opaque credential sink
//! <sessionsDir>/<sessionKey>/jobs/<jobId>.json
//! <sessionsDir>/<sessionKey>/jobs/<jobId>.log      # append-only output
//! <workspacesDir>/<sessionKey>/                    # opaque workspace
//! ```

use std::path::{Path, PathBuf};
use warden_core::id::{JobId, SessionKey};

pub struct Layout {
    pub sessions_dir: PathBuf,
    pub workspaces_dir: PathBuf,
}

impl Layout {
    pub fn new(sessions_dir: impl Into<PathBuf>, workspaces_dir: impl Into<PathBuf>) -> Self {
        Self { sessions_dir: sessions_dir.into(), workspaces_dir: workspaces_dir.into() }
    }

    pub fn session_dir(&self, key: &SessionKey) -> PathBuf {
        self.sessions_dir.join(key.as_str())
    }

    pub fn session_file(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join("session.json")
    }

    pub fn credentials_dir(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join(".claude")
    }

    pub fn jobs_dir(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join("jobs")
    }

    pub fn job_file(&self, key: &SessionKey, job_id: &JobId) -> PathBuf {
        self.jobs_dir(key).join(format!("{job_id}.json"))
    }

    pub fn job_output_file(&self, key: &SessionKey, job_id: &JobId) -> PathBuf {
        self.jobs_dir(key).join(format!("{job_id}.log"))
    }

    pub fn workspace_dir(&self, key: &SessionKey) -> PathBuf {
        self.workspaces_dir.join(key.as_str())
    }
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
