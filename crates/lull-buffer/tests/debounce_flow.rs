// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end debounce behaviour driven purely by marker expiry: store reaper,
//! expiration events, notifier, lock, and sink all run for real on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use lull_buffer::{BufferTimings, ChannelSink, DebounceBuffer, FlushNotifier, NotifierHandle};
use lull_config::model::NotifierConfig;
use lull_core::{ActivityStatus, BufferedMessage, ConversationId, FlushEvent, Keyspace};
use lull_store::MemoryStore;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const WINDOW: Duration = Duration::from_millis(2000);

struct Running {
    engine: DebounceBuffer,
    events: mpsc::Receiver<FlushEvent>,
    cancel: CancellationToken,
    notifier: NotifierHandle,
    reaper: tokio::task::JoinHandle<()>,
}

impl Running {
    async fn start() -> Self {
        let store = MemoryStore::default();
        let cancel = CancellationToken::new();
        let reaper = store.spawn_reaper(cancel.clone());
        let (sink, events) = ChannelSink::new(16);
        let engine = DebounceBuffer::new(
            Arc::new(store),
            Keyspace::default(),
            BufferTimings::default(),
            Arc::new(sink),
        );
        let notifier = FlushNotifier::new(engine.clone(), &NotifierConfig::default())
            .start(cancel.clone())
            .await
            .unwrap();
        Self {
            engine,
            events,
            cancel,
            notifier,
            reaper,
        }
    }

    async fn next_event(&mut self, within: Duration) -> Option<FlushEvent> {
        timeout(within, self.events.recv()).await.ok().flatten()
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.notifier.join().await;
        self.reaper.await.unwrap();
    }
}

fn c1() -> ConversationId {
    ConversationId::from("c1")
}

#[tokio::test(start_paused = true)]
async fn burst_within_window_flushes_once_in_order() {
    let mut run = Running::start().await;
    let meta = json!({"agentId": "agent-1", "sender": "5511999", "token": "tk"});

    run.engine
        .add_message(&c1(), BufferedMessage::text("m1", "hi"), Some(meta.clone()), WINDOW)
        .await
        .unwrap();
    sleep(Duration::from_millis(800)).await;
    run.engine
        .add_message(&c1(), BufferedMessage::text("m2", "there"), Some(meta.clone()), WINDOW)
        .await
        .unwrap();

    let event = run.next_event(Duration::from_secs(10)).await.unwrap();
    assert_eq!(event.conversation_id, c1());
    assert_eq!(event.message_count, 2);
    let ids: Vec<_> = event.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2"]);
    assert_eq!(event.metadata, Some(meta));

    assert!(run.next_event(Duration::from_secs(30)).await.is_none());
    assert!(run.engine.window(&c1()).await.unwrap().is_none());
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn steady_stream_does_not_flush_until_gap() {
    let mut run = Running::start().await;

    for n in 0..6 {
        run.engine
            .add_message(&c1(), BufferedMessage::text(format!("m{n}"), "x"), None, WINDOW)
            .await
            .unwrap();
        sleep(Duration::from_secs(3)).await;
        assert!(run.events.try_recv().is_err(), "flushed mid-stream after m{n}");
    }

    let event = run.next_event(Duration::from_secs(10)).await.unwrap();
    assert_eq!(event.message_count, 6);
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn typing_defers_until_idle() {
    let mut run = Running::start().await;

    run.engine
        .add_message(&c1(), BufferedMessage::text("m1", "hi"), None, WINDOW)
        .await
        .unwrap();
    run.engine
        .set_activity(&c1(), ActivityStatus::Typing)
        .await
        .unwrap();

    // Marker (4s) expires and the check defers.
    assert!(run.next_event(Duration::from_secs(6)).await.is_none());
    assert_eq!(run.engine.window(&c1()).await.unwrap().unwrap().len(), 1);

    run.engine
        .add_message(&c1(), BufferedMessage::text("m2", "still typing"), None, WINDOW)
        .await
        .unwrap();
    run.engine
        .set_activity(&c1(), ActivityStatus::Idle)
        .await
        .unwrap();

    let event = run.next_event(Duration::from_secs(5)).await.unwrap();
    assert_eq!(event.message_count, 2);
    assert_eq!(event.joined_text(), "hi\nstill typing");
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn conversations_flush_independently() {
    let mut run = Running::start().await;
    let c2 = ConversationId::from("c2");

    run.engine
        .add_message(&c1(), BufferedMessage::text("a", "one"), None, WINDOW)
        .await
        .unwrap();
    run.engine
        .add_message(&c2, BufferedMessage::text("b", "two"), None, Duration::from_secs(10))
        .await
        .unwrap();

    let first = run.next_event(Duration::from_secs(6)).await.unwrap();
    assert_eq!(first.conversation_id, c1());
    let second = run.next_event(Duration::from_secs(10)).await.unwrap();
    assert_eq!(second.conversation_id, c2);
    run.stop().await;
}
