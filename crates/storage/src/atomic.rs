// SPDX-License-Identifier: MIT

//! Atomic-rename write discipline for records that may be read concurrently.
//!
//! A fresh, randomly-suffixed temp file is written and fsynced, then renamed
//! over the target. A reader never observes a half-written record, and
//! concurrent writers never collide on the same temp name.

use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("record"),
        uuid::Uuid::new_v4()
    );
    let tmp_path = dir.join(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
