// SPDX-License-Identifier: MIT

//! In-memory `Notifier` for tests: records every delivered payload.
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{JobNotification, NotifyError, Notifier};

#[derive(Clone, Default)]
pub struct FakeNotifier {
    calls: Arc<Mutex<Vec<JobNotification>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<JobNotification> {
        self.calls.lock().clone()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, payload: JobNotification) -> Result<(), NotifyError> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(NotifyError::DeliveryFailed("fake failure".to_string()));
        }
        self.calls.lock().push(payload);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
