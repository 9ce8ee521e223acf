// SPDX-License-Identifier: MIT

//! Filesystem-backed durable persistence for sessions, jobs, and their
//! output logs.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod atomic;
pub mod error;
pub mod fs_store;
pub mod layout;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use fs_store::FsStore;
pub use layout::Layout;
pub use store::Store;
pub use types::{OutputSlice, OutputTail, DEFAULT_READ_LIMIT};
