// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value store capability interface.
//!
//! The engine only needs a small, Redis-shaped subset: string values with
//! whole-second TTLs, conditional create, multi-key delete, compare-and-delete,
//! TTL introspection, pattern pub/sub, and key-expiration events.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::LullError;
use crate::traits::adapter::PluginAdapter;

/// Channel on which stores publish the name of every key that expired.
pub const EXPIRED_EVENTS_CHANNEL: &str = "__keyevent@0__:expired";

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

/// A message delivered to a pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub pattern: String,
    pub channel: String,
    pub payload: String,
}

/// Receiving half of a pattern subscription.
///
/// Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    pattern: String,
    rx: mpsc::Receiver<PubSubMessage>,
}

impl Subscription {
    pub fn new(pattern: impl Into<String>, rx: mpsc::Receiver<PubSubMessage>) -> Self {
        Self {
            pattern: pattern.into(),
            rx,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Waits for the next message. `None` once the store dropped the subscription.
    pub async fn recv(&mut self) -> Option<PubSubMessage> {
        self.rx.recv().await
    }

    /// Returns a message that is already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<PubSubMessage> {
        self.rx.try_recv().ok()
    }
}

/// Shared, TTL-capable key-value store with publish/subscribe.
#[async_trait]
pub trait KvStore: PluginAdapter {
    /// Reads a value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, LullError>;

    /// Writes a value, replacing any previous value and TTL.
    /// `ttl = None` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), LullError>;

    /// Writes a value only if the key is absent. Returns whether it was written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LullError>;

    /// Deletes all given keys in one atomic step. Returns how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, LullError>;

    /// Deletes `key` only if it currently holds `expected`, atomically.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, LullError>;

    async fn exists(&self, key: &str) -> Result<bool, LullError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, LullError>;

    /// Resets the TTL of an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, LullError>;

    /// Publishes a payload. Returns the number of subscriptions that received it.
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, LullError>;

    /// Subscribes to every channel matching a glob pattern (`*` and `?`).
    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, LullError>;

    /// Turns on key-expiration events on [`EXPIRED_EVENTS_CHANNEL`].
    ///
    /// Returns `false` when the backend cannot provide them; callers must then
    /// drive flush checks by explicit publishes only.
    async fn enable_expiry_events(&self) -> Result<bool, LullError>;
}
