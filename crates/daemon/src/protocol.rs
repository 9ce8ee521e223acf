// SPDX-License-Identifier: MIT

//! IPC protocol between `warden` (the CLI) and `wardend` (the daemon).
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload, the same
//! framing the core socket speaks for every other message in this family.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use warden_core::{ApiError, JobId, SessionKey};

use crate::types::{CleanupResult, OutputResult, SessionSummary, StartRequest, StartResult, StatusResult};

/// Request from CLI to daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping.
    Ping,

    Start {
        prompt: String,
        #[serde(default)]
        session_key: Option<SessionKey>,
        has_credentials: bool,
        #[serde(default)]
        credentials_source: Option<std::path::PathBuf>,
    },

    Status {
        job_id: JobId,
        #[serde(default)]
        session_key: Option<SessionKey>,
    },

    Output {
        job_id: JobId,
        #[serde(default)]
        session_key: Option<SessionKey>,
        #[serde(default)]
        offset: u64,
        #[serde(default)]
        limit: Option<u64>,
    },

    Cancel {
        job_id: JobId,
        #[serde(default)]
        session_key: Option<SessionKey>,
    },

    Cleanup {
        #[serde(default)]
        delete_workspaces: bool,
    },

    Sessions,
}

impl From<StartRequest> for Request {
    fn from(r: StartRequest) -> Self {
        Request::Start {
            prompt: r.prompt,
            session_key: r.session_key,
            has_credentials: r.has_credentials,
            credentials_source: r.credentials_source,
        }
    }
}

/// Response from daemon to CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Health check response.
    Pong,

    Start {
        result: StartResult,
    },

    Status {
        result: StatusResult,
    },

    Output {
        header: String,
        bytes: Vec<u8>,
    },

    Cancel {
        message: String,
    },

    Cleanup {
        result: CleanupResult,
    },

    Sessions {
        sessions: Vec<SessionSummary>,
    },

    /// The requested operation failed; carries enough structure for the CLI
    /// to print a stable, scriptable error without re-deriving it from text.
    Error {
        kind: ApiErrorKind,
        message: String,
    },
}

impl From<OutputResult> for Response {
    fn from(r: OutputResult) -> Self {
        Response::Output { header: r.header, bytes: r.bytes }
    }
}

impl From<&ApiError> for ApiErrorKind {
    fn from(e: &ApiError) -> Self {
        match e {
            ApiError::MissingParameter(_) => ApiErrorKind::MissingParameter,
            ApiError::SessionNotFound(_) => ApiErrorKind::SessionNotFound,
            ApiError::JobNotFound(_) => ApiErrorKind::JobNotFound,
            ApiError::ActiveJobExists(_) => ApiErrorKind::ActiveJobExists,
            ApiError::MissingAuthentication => ApiErrorKind::MissingAuthentication,
            ApiError::MissingImage => ApiErrorKind::MissingImage,
            ApiError::Store(_) => ApiErrorKind::Store,
            ApiError::SpawnFailed(_) => ApiErrorKind::SpawnFailed,
        }
    }
}

/// Stable, serializable tag for `ApiError`'s variant, independent of its
/// (English, interpolated) `Display` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    MissingParameter,
    SessionNotFound,
    JobNotFound,
    ActiveJobExists,
    MissingAuthentication,
    MissingImage,
    Store,
    SpawnFailed,
}

impl Response {
    pub fn from_api_error(e: &ApiError) -> Self {
        Response::Error { kind: ApiErrorKind::from(e), message: e.to_string() }
    }
}

/// Protocol-level failures: framing, transport, or serialization problems
/// distinct from the application-level `Response::Error` variant.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// Maximum message size (16 MiB; job output is paginated, so a single
/// message never needs to carry more than one bounded slice).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default IPC timeout for a single request/response round trip.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Encode a message to JSON bytes (without the length prefix). Pair with
/// `write_message`, which applies the wire framing.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: json.len(), max: MAX_MESSAGE_SIZE });
    }
    Ok(json)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads a length-prefixed message from an async reader.
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Writes a length-prefixed message to an async writer.
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader)).await.map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data)).await.map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
