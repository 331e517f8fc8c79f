// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the in-process store (with its reaper), the
//! conversation resolver, the debounce engine delivering to a
//! [`RecordingSink`], and a running notifier. Pair it with
//! `#[tokio::test(start_paused = true)]` so marker TTLs elapse instantly.

use std::sync::Arc;
use std::time::Duration;

use lull_buffer::{BufferTimings, DebounceBuffer, FlushNotifier, NotifierHandle, NotifierMode};
use lull_config::LullConfig;
use lull_conversation::ConversationResolver;
use lull_core::{ActivityStatus, BufferedMessage, ConversationId, Keyspace, LullError};
use lull_store::{MemoryStore, MemoryStoreConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::recording_sink::RecordingSink;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: LullConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: LullConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: LullConfig) -> Self {
        self.config = config;
        self
    }

    /// Debounce window used by [`TestHarness::send_message`].
    pub fn with_window(mut self, window: Duration) -> Self {
        self.config.buffer.window_ms = window.as_millis() as u64;
        self
    }

    /// Whether the store emits key-expiration events.
    pub fn with_keyspace_events(mut self, enabled: bool) -> Self {
        self.config.store.keyspace_events = enabled;
        self
    }

    /// Build the harness and start the reaper and notifier.
    pub async fn build(self) -> Result<TestHarness, LullError> {
        let config = self.config;
        let keys = Keyspace::new(config.store.namespace.clone());

        let store = MemoryStore::new(MemoryStoreConfig {
            keyspace_events: config.store.keyspace_events,
            reaper_interval: config.store.reaper_interval(),
            subscription_capacity: config.notifier.channel_capacity,
        });
        let cancel = CancellationToken::new();
        let reaper = store.spawn_reaper(cancel.clone());

        let shared: Arc<dyn lull_core::KvStore> = Arc::new(store.clone());
        let resolver = ConversationResolver::new(shared.clone(), keys.clone(), &config.conversation);

        let sink = Arc::new(RecordingSink::new());
        let engine = DebounceBuffer::new(
            shared,
            keys.clone(),
            BufferTimings::from(&config.buffer),
            sink.clone(),
        );

        let notifier = FlushNotifier::new(engine.clone(), &config.notifier)
            .start(cancel.clone())
            .await?;

        Ok(TestHarness {
            store,
            keys,
            resolver,
            engine,
            sink,
            config,
            cancel,
            notifier,
            reaper,
        })
    }
}

/// A running lull pipeline on an in-process store.
pub struct TestHarness {
    /// The in-process store, for direct key inspection.
    pub store: MemoryStore,
    pub keys: Keyspace,
    pub resolver: ConversationResolver,
    pub engine: DebounceBuffer,
    /// Every flush event the engine emitted.
    pub sink: Arc<RecordingSink>,
    pub config: LullConfig,
    cancel: CancellationToken,
    notifier: NotifierHandle,
    reaper: JoinHandle<()>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn notifier_mode(&self) -> NotifierMode {
        self.notifier.mode()
    }

    /// Token that stops the reaper and notifier when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Delivers a text message the way the webhook does: resolve the
    /// conversation, mark the sender idle, then append with the configured window.
    pub async fn send_message(
        &self,
        agent_id: &str,
        sender: &str,
        message_id: &str,
        text: &str,
    ) -> Result<ConversationId, LullError> {
        let id = self.resolver.get_or_create(agent_id, sender, None).await?;
        self.engine.set_activity(&id, ActivityStatus::Idle).await?;
        self.engine
            .add_message(
                &id,
                BufferedMessage::text(message_id, text),
                Some(serde_json::json!({ "agentId": agent_id, "sender": sender })),
                self.config.buffer.window(),
            )
            .await?;
        Ok(id)
    }

    /// Stops background tasks and waits for in-flight flush checks.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.notifier.join().await;
        if let Err(e) = self.reaper.await {
            tracing::warn!(error = %e, "reaper task failed");
        }
    }
}
