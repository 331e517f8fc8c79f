// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the lull engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque identifier of a conversation.
///
/// Generated ids are UUIDv7 in simple form, so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generates a new random-but-sortable conversation id.
    pub fn generate() -> Self {
        ConversationId(uuid::Uuid::now_v7().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        ConversationId(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        ConversationId(value)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Sink,
    Gateway,
}

/// Live input signal from the sender.
///
/// `Idle` is never written to the store: absence of the activity key means idle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Typing,
    Recording,
    #[default]
    Idle,
}

impl ActivityStatus {
    /// True while the sender is mid-input and flushes must be postponed.
    pub fn is_active(self) -> bool {
        !matches!(self, ActivityStatus::Idle)
    }
}

/// One inbound chat message held in a debounce window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedMessage {
    pub id: String,
    pub text: String,
    pub media_type: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl BufferedMessage {
    /// Plain text message with empty media type.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            media_type: String::new(),
            kind: "text".to_string(),
        }
    }
}

/// Stored record of a conversation, keyed by (agent, sender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub agent_id: String,
    pub sender_id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Last time the conversation was touched, milliseconds since the Unix epoch.
    pub last_message_at: i64,
}

/// The single unit of work emitted when a debounce window closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushEvent {
    pub conversation_id: ConversationId,
    /// Messages in arrival order.
    pub messages: Vec<BufferedMessage>,
    pub message_count: usize,
    /// Context captured when the window was opened, if any was supplied.
    pub metadata: Option<serde_json::Value>,
}

impl FlushEvent {
    /// Messages joined by newlines, the form downstream reply generation consumes.
    pub fn joined_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
