// SPDX-License-Identifier: MIT

//! Pure, deterministic translation between session keys and container names.

use crate::id::SessionKey;

const PREFIX: &str = "claude-";

/// Derives a container name from a session key by replacing any character
/// outside `[A-Za-z0-9-]` with `-` and prefixing `claude-`.
pub fn container_name_from_session_key(key: &SessionKey) -> String {
    let sanitized: String = key
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    format!("{PREFIX}{sanitized}")
}

/// Inverse of [`container_name_from_session_key`]. Returns `None` if `name`
/// does not begin with the `claude-` prefix (i.e. it is not one of ours).
pub fn session_key_from_container_name(name: &str) -> Option<SessionKey> {
    name.strip_prefix(PREFIX).map(SessionKey::new)
}

#[cfg(test)]
#[path = "container_name_tests.rs"]
mod tests;
