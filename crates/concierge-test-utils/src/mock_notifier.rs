// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier that records deliveries instead of sending them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use concierge_core::{AdapterType, ConciergeError, HealthStatus, Notifier, PluginAdapter};

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub delivery_id: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    /// A notifier that takes `delay` before every delivery.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for RecordingNotifier {
    fn name(&self) -> &str {
        "recording-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, ConciergeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ConciergeError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, name: &str, email: &str, message: &str) -> Result<String, ConciergeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConciergeError::Notify {
                message: "smtp unavailable".into(),
                source: None,
            });
        }
        let delivery_id = format!("mock-{}", uuid::Uuid::new_v4().simple());
        self.sent.lock().await.push(SentMessage {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
            delivery_id: delivery_id.clone(),
        });
        Ok(delivery_id)
    }
}
