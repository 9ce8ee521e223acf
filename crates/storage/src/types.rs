// SPDX-License-Identifier: MIT

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct OutputSlice {
    pub content: Vec<u8>,
    pub size: u64,
    pub total_size: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputTail {
    pub tail: Vec<u8>,
    pub last_output_seconds_ago: Option<i64>,
    pub total_size: u64,
}

pub const DEFAULT_READ_LIMIT: u64 = 64 * 1024;
