// SPDX-License-Identifier: MIT

//! Line-oriented decoder for the assistant's newline-delimited JSON
//! transcript. Pure and reentrant: `parse_line` depends only on its `line`
//! argument (plus the caller-supplied timestamp, which is purely
//! informational and never influences the returned events).

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    TokenExpired,
    AuthenticationFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of assistant-generated text, with the wall-clock time it was
    /// decoded at (informational only — never fed back into parsing).
    TextFragment { text: String, at: DateTime<Utc> },
    RateLimit { reset_time: String, wait_minutes: i64, at: DateTime<Utc> },
    AuthError { kind: AuthErrorKind, at: DateTime<Utc> },
}

#[allow(clippy::expect_used)]
static RATE_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)hit your limit.*?resets\s+(\d{1,2}(?:am|pm)?)\s*\(utc\)")
        .expect("static rate-limit regex is valid")
});

fn rate_limit_re() -> &'static Regex {
    &RATE_LIMIT_RE
}

/// Parses a single line of the transcript. Non-object and malformed lines
/// are silently discarded, per the wire contract: unknown-shape lines must
/// never fail parsing.
pub fn parse_line(line: &str, now: DateTime<Utc>) -> Vec<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line) else {
        return Vec::new();
    };

    let mut events = Vec::new();

    if let Some(text) = extract_content_block_delta_text(&obj) {
        if !text.is_empty() {
            events.push(StreamEvent::TextFragment { text, at: now });
        }
    }

    if let Some(event) = extract_terminal_signal(&obj, now) {
        events.push(event);
    }

    events
}

fn extract_content_block_delta_text(obj: &serde_json::Map<String, Value>) -> Option<String> {
    let event = obj.get("event")?.as_object()?;
    if event.get("type")?.as_str()? != "content_block_delta" {
        return None;
    }
    let text = event.get("delta")?.as_object()?.get("text")?.as_str()?;
    Some(text.to_string())
}

fn extract_terminal_signal(
    obj: &serde_json::Map<String, Value>,
    now: DateTime<Utc>,
) -> Option<StreamEvent> {
    if obj.get("type")?.as_str()? != "result" {
        return None;
    }
    if !obj.get("is_error")?.as_bool()? {
        return None;
    }
    let result = obj.get("result")?.as_str()?;

    if let Some(caps) = rate_limit_re().captures(result) {
        let reset_time = caps[1].to_string();
        let wait_minutes = wait_minutes_until(&reset_time, now);
        return Some(StreamEvent::RateLimit { reset_time, wait_minutes, at: now });
    }

    if result.contains("OAuth token has expired") {
        return Some(StreamEvent::AuthError { kind: AuthErrorKind::TokenExpired, at: now });
    }
    if result.contains("Failed to authenticate") || result.contains("authentication_error") {
        return Some(StreamEvent::AuthError { kind: AuthErrorKind::AuthenticationFailed, at: now });
    }
    None
}

/// Minutes from `now` (UTC) to the next occurrence of the hour encoded by
/// `spec` (e.g. `"8pm"`, `"12am"`, `"6"`), wrapping to the next day if the
/// hour has already passed today. Always in `[0, 1440)`.
fn wait_minutes_until(spec: &str, now: DateTime<Utc>) -> i64 {
    let target_hour = parse_target_hour(spec);
    let now_minutes = i64::from(now.time().hour()) * 60 + i64::from(now.time().minute());
    let target_minutes = i64::from(target_hour) * 60;
    (target_minutes - now_minutes).rem_euclid(1440)
}

fn parse_target_hour(spec: &str) -> u32 {
    let lower = spec.to_ascii_lowercase();
    if let Some(digits) = lower.strip_suffix("am") {
        let n: u32 = digits.parse().unwrap_or(0);
        return if n == 12 { 0 } else { n };
    }
    if let Some(digits) = lower.strip_suffix("pm") {
        let n: u32 = digits.parse().unwrap_or(0);
        return if n == 12 { 12 } else { n + 12 };
    }
    lower.parse().unwrap_or(0)
}

trait TimeHourMinute {
    fn hour(&self) -> u32;
    fn minute(&self) -> u32;
}

impl TimeHourMinute for chrono::NaiveTime {
    fn hour(&self) -> u32 {
        chrono::Timelike::hour(self)
    }
    fn minute(&self) -> u32 {
        chrono::Timelike::minute(self)
    }
}

/// Concatenation of `TextFragment` contents over `lines`, in input order,
/// ignoring non-object and non-`content_block_delta` lines.
pub fn extract_text_from_stream<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    for line in lines {
        for event in parse_line(line, now) {
            if let StreamEvent::TextFragment { text, .. } = event {
                out.push_str(&text);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
