// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording flush sink for deterministic testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lull_core::{AdapterType, FlushEvent, FlushSink, HealthStatus, LullError, PluginAdapter};
use tokio::sync::{Mutex, Notify};

/// Captures every delivered [`FlushEvent`].
///
/// `fail_next(n)` makes the next `n` deliveries fail, for exercising the
/// engine's keep-and-retry path.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FlushEvent>>,
    notify: Notify,
    failures: AtomicU32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, deliveries: u32) {
        self.failures.store(deliveries, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<FlushEvent> {
        self.events.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Waits until at least `count` events were recorded, or `within` elapses.
    /// Returns what was recorded either way.
    pub async fn wait_for(&self, count: usize, within: Duration) -> Vec<FlushEvent> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let notified = self.notify.notified();
            {
                let events = self.events.lock().await;
                if events.len() >= count {
                    return events.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.events().await;
            }
        }
    }
}

#[async_trait]
impl PluginAdapter for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, LullError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LullError> {
        Ok(())
    }
}

#[async_trait]
impl FlushSink for RecordingSink {
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LullError::Internal("recording sink: injected failure".into()));
        }
        self.events.lock().await.push(event);
        self.notify.notify_waiters();
        Ok(())
    }
}
