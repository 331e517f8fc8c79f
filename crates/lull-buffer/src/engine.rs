// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The debounce buffer engine.
//!
//! Per conversation the store holds four keys: the window (messages), the
//! marker (TTL only, its expiry drives flush checks), the activity signal, and
//! the metadata snapshot captured when the window opened. All values are JSON.
//! TTLs are whole seconds; sub-second durations round up.
//!
//! `add_message` and `set_activity` do not take the flush lock. Only the flush
//! decision is mutually exclusive; a message landing while a flush is being
//! decided is last-write-wins.

use std::sync::Arc;
use std::time::Duration;

use lull_config::model::BufferConfig;
use lull_core::{
    ActivityStatus, BufferedMessage, ConversationId, FlushEvent, FlushSink, Keyspace, KvStore,
    LullError,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::lock::FlushLock;
use crate::window::Window;

/// Durations the engine applies to store keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTimings {
    /// Added on top of the debounce window when arming the marker.
    pub marker_margin: Duration,
    /// Marker TTL once the sender goes idle with a window open.
    pub idle_flush_delay: Duration,
    /// Marker TTL after a check found the sender still active.
    pub defer_delay: Duration,
    pub activity_ttl: Duration,
    /// Safety TTL of window data and metadata.
    pub window_ttl: Duration,
    pub lock_ttl: Duration,
}

impl BufferTimings {
    /// How long a flush check may wait on the sink. Ends well before the
    /// flush lock lapses, so no second check can read the same window.
    pub fn delivery_budget(&self) -> Duration {
        self.lock_ttl.saturating_mul(3) / 4
    }
}

impl Default for BufferTimings {
    fn default() -> Self {
        Self::from(&BufferConfig::default())
    }
}

impl From<&BufferConfig> for BufferTimings {
    fn from(config: &BufferConfig) -> Self {
        Self {
            marker_margin: Duration::from_secs(config.marker_margin_secs),
            idle_flush_delay: Duration::from_secs(config.idle_flush_delay_secs),
            defer_delay: Duration::from_secs(config.defer_delay_secs),
            activity_ttl: Duration::from_secs(config.activity_ttl_secs),
            window_ttl: Duration::from_secs(config.window_ttl_secs),
            lock_ttl: Duration::from_secs(config.lock_ttl_secs),
        }
    }
}

/// What a flush check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another holder owns the flush lock; nothing was read.
    Contended,
    /// No window, or an empty one.
    Empty,
    /// The sender is still active; the marker was re-armed.
    Deferred,
    /// The window was handed to the sink and cleared.
    Flushed { message_count: usize },
}

/// Accumulates messages per conversation and emits one [`FlushEvent`] per window.
#[derive(Clone)]
pub struct DebounceBuffer {
    store: Arc<dyn KvStore>,
    keys: Keyspace,
    lock: FlushLock,
    sink: Arc<dyn FlushSink>,
    timings: BufferTimings,
}

impl DebounceBuffer {
    pub fn new(
        store: Arc<dyn KvStore>,
        keys: Keyspace,
        timings: BufferTimings,
        sink: Arc<dyn FlushSink>,
    ) -> Self {
        let lock = FlushLock::new(store.clone(), keys.clone(), timings.lock_ttl);
        Self {
            store,
            keys,
            lock,
            sink,
            timings,
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keys
    }

    pub fn timings(&self) -> BufferTimings {
        self.timings
    }

    /// Appends a message and re-arms the marker to `window` plus the margin.
    ///
    /// Opens the window if there is none, storing `metadata` as its snapshot.
    /// An open window's snapshot is never replaced. Returns the number of
    /// messages now in the window.
    pub async fn add_message(
        &self,
        id: &ConversationId,
        message: BufferedMessage,
        metadata: Option<serde_json::Value>,
        window: Duration,
    ) -> Result<usize, LullError> {
        debug!(
            conversation_id = %id,
            message_id = %message.id,
            media_type = %message.media_type,
            window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            "adding message to window"
        );

        let existing = self.window(id).await?;
        let opened = existing.is_none();
        let mut current = existing.unwrap_or_default();
        let message_id = message.id.clone();
        current.messages.push(message);
        current.expires_at =
            now_millis().saturating_add(i64::try_from(window.as_millis()).unwrap_or(i64::MAX));

        self.write_window(id, &current).await?;

        if opened && let Some(metadata) = metadata {
            let encoded = encode(&metadata, "metadata snapshot")?;
            self.store
                .set(&self.keys.metadata(id), &encoded, Some(self.timings.window_ttl))
                .await?;
            debug!(conversation_id = %id, "window opened with metadata snapshot");
        }

        let marker_ttl = whole_secs(window).saturating_add(self.timings.marker_margin);
        self.arm_marker(id, marker_ttl).await?;

        info!(
            conversation_id = %id,
            message_id = %message_id,
            message_count = current.len(),
            ttl_secs = marker_ttl.as_secs(),
            "message added to window"
        );
        Ok(current.len())
    }

    /// Records the sender's input state.
    ///
    /// Typing and recording write the short-lived activity key and flag an
    /// open window as awaiting input. Idle clears both and, if a marker is
    /// armed, shortens it so pending messages flush promptly.
    pub async fn set_activity(
        &self,
        id: &ConversationId,
        status: ActivityStatus,
    ) -> Result<(), LullError> {
        debug!(conversation_id = %id, %status, "setting activity");
        let activity_key = self.keys.activity(id);

        if status.is_active() {
            let encoded = encode(&status, "activity status")?;
            self.store
                .set(&activity_key, &encoded, Some(self.timings.activity_ttl))
                .await?;
            self.flag_window(id, true).await?;
        } else {
            self.store.del(&[activity_key]).await?;
            self.flag_window(id, false).await?;
            let shortened = self
                .store
                .expire(&self.keys.marker(id), self.timings.idle_flush_delay)
                .await?;
            if shortened {
                debug!(
                    conversation_id = %id,
                    ttl_secs = self.timings.idle_flush_delay.as_secs(),
                    "marker shortened after sender went idle"
                );
            }
        }

        info!(conversation_id = %id, %status, "activity set");
        Ok(())
    }

    /// Current activity. An absent or unreadable key is idle.
    pub async fn activity(&self, id: &ConversationId) -> Result<ActivityStatus, LullError> {
        Ok(self
            .read_json::<ActivityStatus>(&self.keys.activity(id), "activity status")
            .await?
            .unwrap_or_default())
    }

    /// The open window, if any. Unreadable data counts as no window.
    pub async fn window(&self, id: &ConversationId) -> Result<Option<Window>, LullError> {
        self.read_json(&self.keys.window(id), "window").await
    }

    /// The snapshot stored when the window opened.
    pub async fn metadata(
        &self,
        id: &ConversationId,
    ) -> Result<Option<serde_json::Value>, LullError> {
        self.read_json(&self.keys.metadata(id), "metadata snapshot")
            .await
    }

    /// Asks every listening notifier to run a flush check now.
    /// Returns how many subscribers received the request.
    pub async fn request_flush(&self, id: &ConversationId) -> Result<u64, LullError> {
        let receivers = self
            .store
            .publish(&self.keys.flush_channel(id), "flush")
            .await?;
        debug!(conversation_id = %id, receivers, "flush requested");
        Ok(receivers)
    }

    /// Runs one flush decision under the conversation's flush lock.
    pub(crate) async fn flush_check(&self, id: &ConversationId) -> Result<FlushOutcome, LullError> {
        debug!(conversation_id = %id, "handling flush notification");

        let Some(token) = self.lock.acquire(id).await? else {
            debug!(conversation_id = %id, "flush lock held elsewhere, skipping");
            return Ok(FlushOutcome::Contended);
        };

        let outcome = self.decide(id, Instant::now()).await;

        if let Err(e) = self.lock.release(token).await {
            warn!(conversation_id = %id, error = %e, "failed to release flush lock, it will expire");
        }
        outcome
    }

    async fn decide(
        &self,
        id: &ConversationId,
        locked_at: Instant,
    ) -> Result<FlushOutcome, LullError> {
        let Some(window) = self.window(id).await? else {
            debug!(conversation_id = %id, "no window, nothing to flush");
            return Ok(FlushOutcome::Empty);
        };
        if window.is_empty() {
            debug!(conversation_id = %id, "window is empty, nothing to flush");
            return Ok(FlushOutcome::Empty);
        }

        let activity = self.activity(id).await?;
        if activity.is_active() {
            info!(
                conversation_id = %id,
                status = %activity,
                awaiting_user_input = window.awaiting_user_input,
                ttl_secs = self.timings.defer_delay.as_secs(),
                "flush deferred, sender is active"
            );
            self.arm_marker(id, self.timings.defer_delay).await?;
            return Ok(FlushOutcome::Deferred);
        }
        if window.awaiting_user_input {
            // The typing signal expired without an idle presence following it.
            debug!(conversation_id = %id, "awaiting-input flag outlived activity, flushing");
        }

        let metadata = self.metadata(id).await?;
        let message_count = window.len();
        let event = FlushEvent {
            conversation_id: id.clone(),
            messages: window.messages,
            message_count,
            metadata,
        };

        info!(conversation_id = %id, message_count, sink = self.sink.name(), "emitting flush event");
        let budget = self.timings.delivery_budget();
        let remaining = budget.saturating_sub(locked_at.elapsed());
        let delivered = match tokio::time::timeout(remaining, self.sink.deliver(event)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(conversation_id = %id, sink = self.sink.name(), "flush sink did not accept the event in time");
                Err(LullError::Timeout { duration: budget })
            }
        };
        if let Err(e) = delivered {
            // Keep the window and let the marker bring us back.
            self.arm_marker(id, self.timings.defer_delay).await?;
            return Err(e);
        }

        self.store.del(&self.keys.window_keys(id)).await?;
        debug!(conversation_id = %id, "window cleared after flush");
        Ok(FlushOutcome::Flushed { message_count })
    }

    async fn flag_window(&self, id: &ConversationId, awaiting: bool) -> Result<(), LullError> {
        if let Some(mut window) = self.window(id).await? {
            window.awaiting_user_input = awaiting;
            self.write_window(id, &window).await?;
        }
        Ok(())
    }

    async fn write_window(&self, id: &ConversationId, window: &Window) -> Result<(), LullError> {
        let encoded = encode(window, "window")?;
        self.store
            .set(&self.keys.window(id), &encoded, Some(self.timings.window_ttl))
            .await
    }

    async fn arm_marker(&self, id: &ConversationId, ttl: Duration) -> Result<(), LullError> {
        let encoded = encode(id, "marker")?;
        self.store
            .set(&self.keys.marker(id), &encoded, Some(whole_secs(ttl)))
            .await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        key: &str,
        context: &str,
    ) -> Result<Option<T>, LullError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, context, error = %e, "stored value is not valid JSON, treating as absent");
                Ok(None)
            }
        }
    }
}

fn encode<T: Serialize + ?Sized>(value: &T, context: &str) -> Result<String, LullError> {
    serde_json::to_string(value).map_err(|e| LullError::codec(context, e))
}

/// Rounds up to whole seconds, never below one.
pub(crate) fn whole_secs(duration: Duration) -> Duration {
    let secs = duration.as_millis().div_ceil(1000).max(1);
    Duration::from_secs(u64::try_from(secs).unwrap_or(u64::MAX))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use lull_core::KeyTtl;
    use lull_store::MemoryStore;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    struct Fixture {
        engine: DebounceBuffer,
        store: MemoryStore,
        events: mpsc::Receiver<FlushEvent>,
        keys: Keyspace,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::default();
        let (sink, events) = ChannelSink::new(8);
        let engine = DebounceBuffer::new(
            Arc::new(store.clone()),
            Keyspace::default(),
            BufferTimings::default(),
            Arc::new(sink),
        );
        Fixture {
            engine,
            store,
            events,
            keys: Keyspace::default(),
        }
    }

    fn c1() -> ConversationId {
        ConversationId::from("c1")
    }

    const WINDOW: Duration = Duration::from_millis(2000);

    #[test]
    fn whole_secs_rounds_up() {
        assert_eq!(whole_secs(Duration::from_millis(2000)), Duration::from_secs(2));
        assert_eq!(whole_secs(Duration::from_millis(2001)), Duration::from_secs(3));
        assert_eq!(whole_secs(Duration::from_millis(1)), Duration::from_secs(1));
        assert_eq!(whole_secs(Duration::ZERO), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn add_message_opens_window_and_arms_marker() {
        let f = fixture();
        let count = f
            .engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let window = f.engine.window(&c1()).await.unwrap().unwrap();
        assert_eq!(window.messages[0].id, "m1");
        assert!(!window.awaiting_user_input);
        assert_eq!(
            f.store.ttl(&f.keys.marker(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(4))
        );
        assert_eq!(
            f.store.ttl(&f.keys.window(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(3600))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_window_rounds_marker_up() {
        let f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(
            f.store.ttl(&f.keys.marker(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(3))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn metadata_is_captured_once_per_window() {
        let f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "a"), Some(json!({"v": 1})), WINDOW)
            .await
            .unwrap();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m2", "b"), Some(json!({"v": 2})), WINDOW)
            .await
            .unwrap();
        assert_eq!(f.engine.metadata(&c1()).await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test(start_paused = true)]
    async fn typing_flags_window_and_idle_clears_it() {
        let f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();

        f.engine.set_activity(&c1(), ActivityStatus::Typing).await.unwrap();
        assert_eq!(f.engine.activity(&c1()).await.unwrap(), ActivityStatus::Typing);
        assert!(f.engine.window(&c1()).await.unwrap().unwrap().awaiting_user_input);
        assert_eq!(
            f.store.ttl(&f.keys.activity(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(15))
        );

        f.engine.set_activity(&c1(), ActivityStatus::Idle).await.unwrap();
        assert_eq!(f.engine.activity(&c1()).await.unwrap(), ActivityStatus::Idle);
        assert!(!f.engine.window(&c1()).await.unwrap().unwrap().awaiting_user_input);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_shortens_armed_marker() {
        let f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, Duration::from_secs(30))
            .await
            .unwrap();
        f.engine.set_activity(&c1(), ActivityStatus::Idle).await.unwrap();
        assert_eq!(
            f.store.ttl(&f.keys.marker(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(4))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_without_window_writes_nothing() {
        let f = fixture();
        f.engine.set_activity(&c1(), ActivityStatus::Idle).await.unwrap();
        assert_eq!(f.store.key_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_expires_to_idle() {
        let f = fixture();
        f.engine.set_activity(&c1(), ActivityStatus::Recording).await.unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(f.engine.activity(&c1()).await.unwrap(), ActivityStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_check_emits_and_clears() {
        let mut f = fixture();
        let meta = json!({"agentId": "a1"});
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), Some(meta.clone()), WINDOW)
            .await
            .unwrap();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m2", "there"), None, WINDOW)
            .await
            .unwrap();

        let outcome = f.engine.flush_check(&c1()).await.unwrap();
        assert_eq!(outcome, FlushOutcome::Flushed { message_count: 2 });

        let event = f.events.try_recv().unwrap();
        assert_eq!(event.conversation_id, c1());
        assert_eq!(event.message_count, 2);
        assert_eq!(event.joined_text(), "hi\nthere");
        assert_eq!(event.metadata, Some(meta));

        assert_eq!(f.store.key_count().await, 0);
        assert_eq!(f.engine.flush_check(&c1()).await.unwrap(), FlushOutcome::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_check_defers_while_typing() {
        let mut f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();
        f.engine.set_activity(&c1(), ActivityStatus::Typing).await.unwrap();

        assert_eq!(f.engine.flush_check(&c1()).await.unwrap(), FlushOutcome::Deferred);
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.engine.window(&c1()).await.unwrap().unwrap().len(), 1);
        assert_eq!(
            f.store.ttl(&f.keys.marker(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(10))
        );
        assert!(!f.store.exists(&f.keys.lock(&c1())).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_awaiting_flag_does_not_block_flush() {
        let mut f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();
        f.engine.set_activity(&c1(), ActivityStatus::Typing).await.unwrap();
        tokio::time::advance(Duration::from_secs(16)).await;

        assert_eq!(
            f.engine.flush_check(&c1()).await.unwrap(),
            FlushOutcome::Flushed { message_count: 1 }
        );
        assert!(f.events.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_check_is_contended_while_locked() {
        let f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();
        f.store
            .set(&f.keys.lock(&c1()), "someone-else", Some(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(f.engine.flush_check(&c1()).await.unwrap(), FlushOutcome::Contended);
        assert!(f.engine.window(&c1()).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_keeps_window_and_rearms() {
        let f = fixture();
        let Fixture { engine, store, events, keys } = f;
        drop(events);

        engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();
        store.del(&[keys.marker(&c1())]).await.unwrap();

        assert!(engine.flush_check(&c1()).await.is_err());
        assert_eq!(engine.window(&c1()).await.unwrap().unwrap().len(), 1);
        assert_eq!(
            store.ttl(&keys.marker(&c1())).await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(10))
        );
        assert!(!store.exists(&keys.lock(&c1())).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_sink_times_out_before_lock_lapses() {
        let store = MemoryStore::default();
        let keys = Keyspace::default();
        let (sink, mut events) = ChannelSink::new(1);
        let engine = DebounceBuffer::new(
            Arc::new(store.clone()),
            keys.clone(),
            BufferTimings::default(),
            Arc::new(sink.clone()),
        );

        // The consumer is behind: its only slot is taken.
        sink.deliver(FlushEvent {
            conversation_id: ConversationId::from("c0"),
            messages: Vec::new(),
            message_count: 0,
            metadata: None,
        })
        .await
        .unwrap();
        engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
            .await
            .unwrap();

        let started = Instant::now();
        let stalled = engine.flush_check(&c1()).await;
        assert!(matches!(stalled, Err(LullError::Timeout { .. })));
        assert!(started.elapsed() < BufferTimings::default().lock_ttl);
        assert_eq!(engine.window(&c1()).await.unwrap().unwrap().len(), 1);
        assert!(!store.exists(&keys.lock(&c1())).await.unwrap());

        // Once the consumer catches up the window goes out exactly once.
        assert_eq!(events.recv().await.unwrap().conversation_id.as_str(), "c0");
        assert_eq!(
            engine.flush_check(&c1()).await.unwrap(),
            FlushOutcome::Flushed { message_count: 1 }
        );
        assert_eq!(events.recv().await.unwrap().conversation_id, c1());
        assert!(events.try_recv().is_err());
        assert_eq!(engine.flush_check(&c1()).await.unwrap(), FlushOutcome::Empty);
    }

    #[test]
    fn delivery_budget_ends_before_lock_ttl() {
        let timings = BufferTimings::default();
        assert_eq!(timings.delivery_budget(), Duration::from_millis(22_500));
        assert!(timings.delivery_budget() < timings.lock_ttl);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_window_saturates_instead_of_wrapping() {
        let f = fixture();
        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, Duration::MAX)
            .await
            .unwrap();
        let window = f.engine.window(&c1()).await.unwrap().unwrap();
        assert_eq!(window.expires_at, i64::MAX);
        assert!(f.store.exists(&f.keys.marker(&c1())).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn corrupt_window_is_treated_as_absent() {
        let f = fixture();
        f.store
            .set(&f.keys.window(&c1()), "[[[", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(f.engine.window(&c1()).await.unwrap(), None);
        assert!(logs_contain("stored value is not valid JSON"));
        assert_eq!(f.engine.flush_check(&c1()).await.unwrap(), FlushOutcome::Empty);

        f.engine
            .add_message(&c1(), BufferedMessage::text("m1", "fresh"), None, WINDOW)
            .await
            .unwrap();
        assert_eq!(f.engine.window(&c1()).await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_flush_publishes_on_conversation_channel() {
        let f = fixture();
        let mut sub = f.store.psubscribe(&f.keys.flush_channel_pattern()).await.unwrap();
        assert_eq!(f.engine.request_flush(&c1()).await.unwrap(), 1);
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.channel, f.keys.flush_channel(&c1()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_flush_exactly_once() {
        let mut f = fixture();
        for n in 0..3 {
            f.engine
                .add_message(&c1(), BufferedMessage::text(format!("m{n}"), "x"), None, WINDOW)
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = f.engine.clone();
            handles.push(tokio::spawn(async move { engine.flush_check(&c1()).await.unwrap() }));
        }
        let mut flushed = 0;
        for handle in handles {
            if let FlushOutcome::Flushed { message_count } = handle.await.unwrap() {
                assert_eq!(message_count, 3);
                flushed += 1;
            }
        }
        assert_eq!(flushed, 1);
        assert!(f.events.try_recv().is_ok());
        assert!(f.events.try_recv().is_err());
    }
}
