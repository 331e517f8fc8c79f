// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events stream of flush events for `GET /v1/events`.
//!
//! Event format:
//! ```text
//! event: flush
//! data: {"conversationId": "...", "messages": [...], "messageCount": 2, "metadata": {...}}
//! ```
//!
//! A subscriber that falls more than the broadcast capacity behind receives a
//! `lagged` event carrying the number of flushes it missed.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use lull_core::{AdapterType, FlushEvent, FlushSink, HealthStatus, LullError, PluginAdapter};
use tokio::sync::broadcast;

use crate::server::GatewayState;

/// Flush sink that broadcasts to every connected SSE client.
///
/// Having no connected client is not a failure.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<FlushEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sender half, shared with the gateway state.
    pub fn sender(&self) -> broadcast::Sender<FlushEvent> {
        self.tx.clone()
    }
}

#[async_trait]
impl PluginAdapter for BroadcastSink {
    fn name(&self) -> &str {
        "sse"
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
impl FlushSink for BroadcastSink {
    async fn deliver(&self, event: FlushEvent) -> Result<(), LullError> {
        let conversation_id = event.conversation_id.clone();
        match self.tx.send(event) {
            Ok(clients) => {
                tracing::debug!(conversation_id = %conversation_id, clients, "flush event broadcast");
            }
            Err(_) => {
                tracing::debug!(conversation_id = %conversation_id, "no SSE clients connected");
            }
        }
        Ok(())
    }
}

fn to_sse(event: &FlushEvent) -> Event {
    match Event::default().event("flush").json_data(event) {
        Ok(sse) => sse,
        Err(e) => Event::default()
            .event("error")
            .data(format!(r#"{{"error": "failed to encode flush event: {e}"}}"#)),
    }
}

/// Stream of SSE events for one subscriber.
pub fn flush_stream(
    rx: broadcast::Receiver<FlushEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let event = match rx.recv().await {
            Ok(flush) => to_sse(&flush),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "SSE client lagged behind flush events");
                Event::default()
                    .event("lagged")
                    .data(format!(r#"{{"missed": {missed}}}"#))
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        };
        Some((Ok(event), rx))
    })
}

/// GET /v1/events
pub async fn get_events(
    State(state): State<GatewayState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("SSE client connected");
    Sse::new(flush_stream(state.events.subscribe())).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use lull_core::{BufferedMessage, ConversationId};

    fn event(id: &str) -> FlushEvent {
        FlushEvent {
            conversation_id: ConversationId::from(id),
            messages: vec![BufferedMessage::text("m1", "hi")],
            message_count: 1,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn deliver_without_clients_succeeds() {
        let sink = BroadcastSink::new(4);
        sink.deliver(event("c1")).await.unwrap();
    }

    #[tokio::test]
    async fn subscribers_receive_delivered_events() {
        let sink = BroadcastSink::new(4);
        let mut rx = sink.sender().subscribe();
        sink.deliver(event("c1")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().conversation_id.as_str(), "c1");
    }

    #[tokio::test]
    async fn stream_ends_when_sender_is_dropped() {
        let sink = BroadcastSink::new(4);
        let rx = sink.sender().subscribe();
        sink.deliver(event("c1")).await.unwrap();
        drop(sink);

        let items: Vec<_> = flush_stream(rx).collect().await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_lagged_event() {
        let sink = BroadcastSink::new(1);
        let rx = sink.sender().subscribe();
        sink.deliver(event("c1")).await.unwrap();
        sink.deliver(event("c2")).await.unwrap();
        drop(sink);

        // One lagged notice, then the surviving event.
        let items: Vec<_> = flush_stream(rx).collect().await;
        assert_eq!(items.len(), 2);
    }
}
