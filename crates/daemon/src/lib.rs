// SPDX-License-Identifier: MIT

//! Warden daemon library.
//!
//! Besides the daemon binary itself, this crate exposes the IPC protocol and
//! the request/result types so `warden-cli` can speak to `wardend` without
//! duplicating the wire format.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod protocol;
mod reconciler;
pub mod server;
mod supervisor;
pub mod types;
mod watcher;

pub use config::{Config, ConfigError};
pub use protocol::{
    decode, encode, read_message, read_request, write_message, write_response, ApiErrorKind,
    ProtocolError, Request, Response, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE,
};
pub use reconciler::OrphanReconciler;
pub use server::Server;
pub use supervisor::JobSupervisor;
pub use types::{
    ActiveJobSummary, ActivityState, CleanupResult, JobError, OutputResult, SessionSummary,
    StartRequest, StartResult, StatusResult,
};
