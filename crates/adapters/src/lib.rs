// SPDX-License-Identifier: MIT

//! Concrete adapters for the `Runtime` and `Notifier` ports: a Docker-backed
//! container runtime, a webhook notifier, and fakes for deterministic tests.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod notify;
pub mod runtime;
pub mod subprocess;

pub use notify::{JobNotification, NoopNotifier, Notifier, NotifyError, WebhookNotifier};
pub use runtime::docker::DockerRuntime;
pub use runtime::{
    ContainerListEntry, ContainerStatus, GetLogsOptions, LogStream, Runtime, RuntimeError,
    StartOpts, StartedContainer,
};

#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifier;
#[cfg(any(test, feature = "test-support"))]
pub use runtime::fake::{FakeRuntime, ScriptedContainer};
