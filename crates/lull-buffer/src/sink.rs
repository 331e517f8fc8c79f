// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flush sinks: where emitted [`FlushEvent`]s go.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lull_core::{AdapterType, FlushEvent, FlushSink, HealthStatus, LullError, PluginAdapter};
use tokio::sync::mpsc;
use tracing::{info, warn};

fn sink_version() -> semver::Version {
    semver::Version::new(0, 1, 0)
}

/// Writes events into a bounded channel read by a consumer task.
///
/// Delivery waits for capacity, so a slow consumer applies backpressure to
/// flush checks instead of growing memory.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<FlushEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FlushEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PluginAdapter for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    fn version(&self) -> semver::Version {
        sink_version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, LullError> {
        if self.tx.is_closed() {
            Ok(HealthStatus::Unhealthy("flush consumer stopped".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), LullError> {
        Ok(())
    }
}

#[async_trait]
impl FlushSink for ChannelSink {
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| LullError::Internal("flush consumer stopped".into()))
    }
}

/// Logs every flush event. Useful as a default consumer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl PluginAdapter for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn version(&self) -> semver::Version {
        sink_version()
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
impl FlushSink for LogSink {
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError> {
        info!(
            conversation_id = %event.conversation_id,
            message_count = event.message_count,
            has_metadata = event.metadata.is_some(),
            text = %event.joined_text(),
            "flush event"
        );
        Ok(())
    }
}

/// Delivers each event to several sinks.
///
/// Fails only when every sink failed, or when there are no sinks at all;
/// partial failures are logged. A failed
/// delivery keeps the window for another attempt, so failing on a partial
/// error would hand the same window to the sinks that already took it.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn FlushSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn FlushSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl PluginAdapter for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    fn version(&self) -> semver::Version {
        sink_version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, LullError> {
        let mut problems = Vec::new();
        for sink in &self.sinks {
            match sink.health_check().await? {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(why) | HealthStatus::Unhealthy(why) => {
                    problems.push(format!("{}: {why}", sink.name()));
                }
            }
        }
        if problems.is_empty() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(problems.join(", ")))
        }
    }

    async fn shutdown(&self) -> Result<(), LullError> {
        for sink in &self.sinks {
            sink.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FlushSink for FanoutSink {
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError> {
        if self.sinks.is_empty() {
            return Err(LullError::Internal("fan-out has no sinks".into()));
        }
        let mut last_error = None;
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.deliver(event.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        conversation_id = %event.conversation_id,
                        sink = sink.name(),
                        error = %e,
                        "flush sink failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }
}

/// Retries a failing sink a fixed number of times with a fixed pause.
pub struct RetrySink {
    inner: Arc<dyn FlushSink>,
    max_retries: u32,
    delay: Duration,
}

impl RetrySink {
    pub fn new(inner: Arc<dyn FlushSink>, max_retries: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            delay,
        }
    }
}

#[async_trait]
impl PluginAdapter for RetrySink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, LullError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), LullError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl FlushSink for RetrySink {
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError> {
        let mut attempt = 0;
        loop {
            match self.inner.deliver(event.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        conversation_id = %event.conversation_id,
                        attempt,
                        error = %e,
                        "flush delivery failed, will retry"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
