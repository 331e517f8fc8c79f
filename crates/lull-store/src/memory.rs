// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process implementation of [`KvStore`].
//!
//! Keys live in a single mutex-guarded map, so every operation, including
//! multi-key deletes and compare-and-delete, is atomic with respect to the
//! others. Expiry is lazy (checked whenever a key is touched) plus a periodic
//! reaper; both paths publish the key name on [`EXPIRED_EVENTS_CHANNEL`] once
//! expiry events are enabled.
//!
//! Time is read from `tokio::time::Instant`, so tests running with a paused
//! clock can advance through TTLs deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use lull_core::{
    AdapterType, EXPIRED_EVENTS_CHANNEL, HealthStatus, KeyTtl, KvStore, LullError, PluginAdapter,
    PubSubMessage, Subscription,
};

use crate::glob::glob_match;

/// Tunables for [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Whether the store is allowed to emit key-expiration events.
    pub keyspace_events: bool,
    /// How often the reaper sweeps for expired keys.
    pub reaper_interval: Duration,
    /// Buffered messages per subscription before new ones are dropped.
    pub subscription_capacity: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            keyspace_events: true,
            reaper_interval: Duration::from_millis(250),
            subscription_capacity: 1024,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct Subscriber {
    pattern: String,
    tx: mpsc::Sender<PubSubMessage>,
}

#[derive(Debug)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber: AtomicU64,
    expiry_events: AtomicBool,
    config: MemoryStoreConfig,
}

/// Process-local TTL key-value store with glob pub/sub.
///
/// Cloning is cheap; clones share the same keyspace.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                subscribers: DashMap::new(),
                next_subscriber: AtomicU64::new(0),
                expiry_events: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Number of live keys. Expired keys that were not reaped yet are excluded.
    pub async fn key_count(&self) -> usize {
        let now = Instant::now();
        let entries = self.inner.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Number of open pattern subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Removes every expired key and publishes their expiration events.
    /// Returns how many keys were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = {
            let mut entries = self.inner.entries.lock().await;
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };
        let count = expired.len();
        self.emit_expired(expired);
        count
    }

    /// Spawns the background sweep that expires keys nobody touches.
    pub fn spawn_reaper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        let period = self.inner.config.reaper_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis() as u64, "memory store reaper started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let reaped = store.purge_expired().await;
                        if reaped > 0 {
                            trace!(reaped, "expired keys reaped");
                        }
                    }
                }
            }
            debug!("memory store reaper stopped");
        })
    }

    fn emit_expired(&self, keys: Vec<String>) {
        if keys.is_empty() || !self.inner.expiry_events.load(Ordering::Acquire) {
            return;
        }
        for key in keys {
            self.dispatch(EXPIRED_EVENTS_CHANNEL, &key);
        }
    }

    /// Fans a message out to every matching subscription without blocking.
    fn dispatch(&self, channel: &str, payload: &str) -> u64 {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for sub in self.inner.subscribers.iter() {
            if !glob_match(&sub.pattern, channel) {
                continue;
            }
            let message = PubSubMessage {
                pattern: sub.pattern.clone(),
                channel: channel.to_string(),
                payload: payload.to_string(),
            };
            match sub.tx.try_send(message) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        pattern = %sub.pattern,
                        channel,
                        "subscription buffer full, message dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*sub.key()),
            }
        }

        for id in closed {
            self.inner.subscribers.remove(&id);
        }
        delivered
    }
}

/// Returns the live entry for `key`, evicting it first if it has expired.
fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
    expired: &mut Vec<String>,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
        expired.push(key.to_string());
        return None;
    }
    entries.get_mut(key)
}

/// TTLs past the clock's range never expire.
fn check_ttl(ttl: Duration) -> Result<(), LullError> {
    if ttl.is_zero() {
        return Err(LullError::store("invalid expire time: TTL must be positive"));
    }
    Ok(())
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, LullError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LullError> {
        // Dropping the senders ends every open subscription.
        self.inner.subscribers.clear();
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LullError> {
        let mut expired = Vec::new();
        let value = {
            let mut entries = self.inner.entries.lock().await;
            live(&mut entries, key, Instant::now(), &mut expired).map(|e| e.value.clone())
        };
        self.emit_expired(expired);
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), LullError> {
        if let Some(ttl) = ttl {
            check_ttl(ttl)?;
        }
        let now = Instant::now();
        let mut entries = self.inner.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LullError> {
        check_ttl(ttl)?;
        let now = Instant::now();
        let mut expired = Vec::new();
        let written = {
            let mut entries = self.inner.entries.lock().await;
            if live(&mut entries, key, now, &mut expired).is_some() {
                false
            } else {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: now.checked_add(ttl),
                    },
                );
                true
            }
        };
        self.emit_expired(expired);
        Ok(written)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, LullError> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let removed = {
            let mut entries = self.inner.entries.lock().await;
            let mut removed = 0;
            for key in keys {
                if live(&mut entries, key, now, &mut expired).is_some() {
                    entries.remove(key);
                    removed += 1;
                }
            }
            removed
        };
        self.emit_expired(expired);
        Ok(removed)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, LullError> {
        let mut expired = Vec::new();
        let deleted = {
            let mut entries = self.inner.entries.lock().await;
            let matches = live(&mut entries, key, Instant::now(), &mut expired)
                .is_some_and(|e| e.value == expected);
            if matches {
                entries.remove(key);
            }
            matches
        };
        self.emit_expired(expired);
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, LullError> {
        let mut expired = Vec::new();
        let present = {
            let mut entries = self.inner.entries.lock().await;
            live(&mut entries, key, Instant::now(), &mut expired).is_some()
        };
        self.emit_expired(expired);
        Ok(present)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, LullError> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let ttl = {
            let mut entries = self.inner.entries.lock().await;
            match live(&mut entries, key, now, &mut expired) {
                None => KeyTtl::Missing,
                Some(Entry {
                    expires_at: None, ..
                }) => KeyTtl::Persistent,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => KeyTtl::Expires(at.saturating_duration_since(now)),
            }
        };
        self.emit_expired(expired);
        Ok(ttl)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, LullError> {
        check_ttl(ttl)?;
        let now = Instant::now();
        let mut expired = Vec::new();
        let updated = {
            let mut entries = self.inner.entries.lock().await;
            match live(&mut entries, key, now, &mut expired) {
                Some(entry) => {
                    entry.expires_at = now.checked_add(ttl);
                    true
                }
                None => false,
            }
        };
        self.emit_expired(expired);
        Ok(updated)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, LullError> {
        Ok(self.dispatch(channel, payload))
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, LullError> {
        let (tx, rx) = mpsc::channel(self.inner.config.subscription_capacity.max(1));
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.insert(
            id,
            Subscriber {
                pattern: pattern.to_string(),
                tx,
            },
        );
        debug!(pattern, subscription = id, "pattern subscription opened");
        Ok(Subscription::new(pattern, rx))
    }

    async fn enable_expiry_events(&self) -> Result<bool, LullError> {
        let supported = self.inner.config.keyspace_events;
        self.inner.expiry_events.store(supported, Ordering::Release);
        Ok(supported)
    }
}
