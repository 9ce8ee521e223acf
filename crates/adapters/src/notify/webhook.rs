// SPDX-License-Identifier: MIT

//! HTTP webhook `Notifier`. POSTs the notification payload as JSON; failures
//! are logged and returned, never retried — the caller (the watcher) treats
//! delivery as fire-and-forget.

use async_trait::async_trait;
use std::time::Duration;

use super::{JobNotification, NotifyError, Notifier};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: JobNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::DeliveryFailed(format!(
                "webhook returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
