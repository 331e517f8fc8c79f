// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expiry/flush notifier.
//!
//! Two listeners run per process:
//!
//! - the flush listener subscribes to every conversation's flush channel and
//!   runs a flush check for each message it receives;
//! - the expiry listener subscribes to the store's key-expiration events,
//!   keeps only marker keys, and republishes them on the flush channel.
//!
//! Any process can therefore force a check by publishing on the channel, and
//! every process listening races for the flush lock.

use lull_config::model::NotifierConfig;
use lull_core::{ConversationId, EXPIRED_EVENTS_CHANNEL, LullError, Subscription};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::engine::DebounceBuffer;

/// Which notification paths are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotifierMode {
    /// Marker expirations and explicit publishes both trigger flush checks.
    KeyspaceAndExplicit,
    /// Only explicit publishes trigger flush checks. Windows will not flush on
    /// marker expiry alone.
    ExplicitOnly,
}

/// Wires store notifications to [`DebounceBuffer`] flush checks.
pub struct FlushNotifier {
    engine: DebounceBuffer,
    expiry_events: bool,
    require_expiry_events: bool,
}

impl FlushNotifier {
    pub fn new(engine: DebounceBuffer, config: &NotifierConfig) -> Self {
        Self {
            engine,
            expiry_events: config.expiry_events,
            require_expiry_events: config.require_expiry_events,
        }
    }

    /// Subscribes and spawns the listeners. They stop when `cancel` fires.
    ///
    /// Fails if expiration events are required but the store cannot provide them.
    pub async fn start(self, cancel: CancellationToken) -> Result<NotifierHandle, LullError> {
        let store = self.engine.store().clone();
        let keys = self.engine.keyspace().clone();

        let flushes = store.psubscribe(&keys.flush_channel_pattern()).await?;

        let expirations = if self.expiry_events {
            if store.enable_expiry_events().await? {
                Some(store.psubscribe(EXPIRED_EVENTS_CHANNEL).await?)
            } else if self.require_expiry_events {
                return Err(LullError::Config(format!(
                    "store '{}' cannot emit key expiration events and notifier.require_expiry_events is set",
                    store.name()
                )));
            } else {
                warn!(
                    store = store.name(),
                    "key expiration events unavailable; windows flush only on explicit flush requests"
                );
                None
            }
        } else {
            warn!("key expiration events disabled; windows flush only on explicit flush requests");
            None
        };

        let mode = if expirations.is_some() {
            NotifierMode::KeyspaceAndExplicit
        } else {
            NotifierMode::ExplicitOnly
        };

        let tracker = TaskTracker::new();
        tracker.spawn(flush_listener(
            self.engine.clone(),
            flushes,
            tracker.clone(),
            cancel.clone(),
        ));
        if let Some(expirations) = expirations {
            tracker.spawn(expiry_listener(self.engine.clone(), expirations, cancel.clone()));
        }

        info!(namespace = keys.namespace(), %mode, "flush notifier started");
        Ok(NotifierHandle { mode, tracker })
    }
}

/// Running notifier. Await [`NotifierHandle::join`] after cancelling.
#[derive(Debug)]
pub struct NotifierHandle {
    mode: NotifierMode,
    tracker: TaskTracker,
}

impl NotifierHandle {
    pub fn mode(&self) -> NotifierMode {
        self.mode
    }

    /// Waits for the listeners and every in-flight flush check to finish.
    pub async fn join(self) {
        self.tracker.close();
        self.tracker.wait().await;
        debug!("flush notifier stopped");
    }
}

async fn flush_listener(
    engine: DebounceBuffer,
    mut flushes: Subscription,
    tracker: TaskTracker,
    cancel: CancellationToken,
) {
    let keys = engine.keyspace().clone();
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = flushes.recv() => message,
        };
        let Some(message) = message else {
            warn!(pattern = flushes.pattern(), "flush subscription closed");
            break;
        };
        let Some(id) = keys.conversation_from_channel(&message.channel) else {
            debug!(channel = %message.channel, "ignoring message on unrecognised channel");
            continue;
        };

        // Each notification is handled on its own; a slow flush must not
        // hold up checks for other conversations.
        let engine = engine.clone();
        tracker.spawn(async move { run_flush_check(engine, id).await });
    }
}

async fn run_flush_check(engine: DebounceBuffer, id: ConversationId) {
    match engine.flush_check(&id).await {
        Ok(outcome) => debug!(conversation_id = %id, ?outcome, "flush check completed"),
        Err(e) => error!(conversation_id = %id, error = %e, "flush check failed"),
    }
}

async fn expiry_listener(
    engine: DebounceBuffer,
    mut expirations: Subscription,
    cancel: CancellationToken,
) {
    let keys = engine.keyspace().clone();
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = expirations.recv() => message,
        };
        let Some(message) = message else {
            warn!("expiration event subscription closed");
            break;
        };
        debug!(key = %message.payload, "expiration event received");
        let Some(id) = keys.conversation_from_marker(&message.payload) else {
            continue;
        };
        debug!(conversation_id = %id, "marker expired, requesting flush");
        if let Err(e) = engine.request_flush(&id).await {
            error!(conversation_id = %id, error = %e, "failed to publish flush request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use lull_core::{BufferedMessage, FlushEvent, Keyspace};
    use lull_store::{MemoryStore, MemoryStoreConfig};
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    use crate::engine::BufferTimings;
    use crate::sink::ChannelSink;

    fn engine(keyspace_events: bool) -> (DebounceBuffer, mpsc::Receiver<FlushEvent>) {
        let store = MemoryStore::new(MemoryStoreConfig {
            keyspace_events,
            ..MemoryStoreConfig::default()
        });
        let (sink, rx) = ChannelSink::new(8);
        let engine = DebounceBuffer::new(
            Arc::new(store),
            Keyspace::default(),
            BufferTimings::default(),
            Arc::new(sink),
        );
        (engine, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn full_mode_when_store_emits_expirations() {
        let (engine, _rx) = engine(true);
        let cancel = CancellationToken::new();
        let handle = FlushNotifier::new(engine, &NotifierConfig::default())
            .start(cancel.clone())
            .await
            .unwrap();
        assert_eq!(handle.mode(), NotifierMode::KeyspaceAndExplicit);
        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn degrades_to_explicit_only_with_warning() {
        let (engine, _rx) = engine(false);
        let cancel = CancellationToken::new();
        let handle = FlushNotifier::new(engine, &NotifierConfig::default())
            .start(cancel.clone())
            .await
            .unwrap();
        assert_eq!(handle.mode(), NotifierMode::ExplicitOnly);
        assert!(logs_contain("key expiration events unavailable"));
        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn required_expirations_fail_startup() {
        let (engine, _rx) = engine(false);
        let config = NotifierConfig {
            require_expiry_events: true,
            ..NotifierConfig::default()
        };
        let err = FlushNotifier::new(engine, &config)
            .start(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LullError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_request_flushes_without_expiry_events() {
        let (engine, mut rx) = engine(false);
        let cancel = CancellationToken::new();
        let handle = FlushNotifier::new(engine.clone(), &NotifierConfig::default())
            .start(cancel.clone())
            .await
            .unwrap();

        let id = ConversationId::from("c1");
        engine
            .add_message(&id, BufferedMessage::text("m1", "hi"), None, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(engine.request_flush(&id).await.unwrap(), 1);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.conversation_id, id);

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn non_marker_expirations_are_ignored() {
        let (engine, mut rx) = engine(true);
        let store = engine.store().clone();
        let cancel = CancellationToken::new();
        let handle = FlushNotifier::new(engine.clone(), &NotifierConfig::default())
            .start(cancel.clone())
            .await
            .unwrap();

        let id = ConversationId::from("c1");
        engine
            .add_message(&id, BufferedMessage::text("m1", "hi"), None, Duration::from_secs(2))
            .await
            .unwrap();
        store
            .publish(EXPIRED_EVENTS_CHANNEL, &Keyspace::default().activity(&id))
            .await
            .unwrap();
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.join().await;
    }
}
