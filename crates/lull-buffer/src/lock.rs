// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation flush lock.
//!
//! Acquisition is a conditional create with a TTL; the stored value is a token
//! unique to the acquisition. Release is a compare-and-delete on that token, so
//! a holder whose lock already lapsed can never delete a successor's lock.

use std::sync::Arc;
use std::time::Duration;

use lull_core::{ConversationId, Keyspace, KvStore, LullError};
use tracing::{debug, warn};

/// Proof of holding a flush lock. Consumed by [`FlushLock::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a held lock should be released"]
pub struct LockToken {
    key: String,
    value: String,
}

impl LockToken {
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Clone)]
pub struct FlushLock {
    store: Arc<dyn KvStore>,
    keys: Keyspace,
    ttl: Duration,
}

impl FlushLock {
    pub fn new(store: Arc<dyn KvStore>, keys: Keyspace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    /// Tries to take the lock. `None` means another holder has it.
    pub async fn acquire(&self, id: &ConversationId) -> Result<Option<LockToken>, LullError> {
        let key = self.keys.lock(id);
        let value = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4().simple());
        if self.store.set_nx(&key, &value, self.ttl).await? {
            debug!(conversation_id = %id, "flush lock acquired");
            Ok(Some(LockToken { key, value }))
        } else {
            Ok(None)
        }
    }

    /// Releases the lock if it is still ours. Returns `false` when it had
    /// already expired (and possibly been taken by someone else).
    pub async fn release(&self, token: LockToken) -> Result<bool, LullError> {
        let released = self.store.delete_if_eq(&token.key, &token.value).await?;
        if !released {
            warn!(key = %token.key, "flush lock expired before release");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lull_store::MemoryStore;

    fn lock(store: &MemoryStore) -> FlushLock {
        FlushLock::new(
            Arc::new(store.clone()),
            Keyspace::default(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquire_is_contended() {
        let store = MemoryStore::default();
        let lock = lock(&store);
        let id = ConversationId::from("c1");

        let token = lock.acquire(&id).await.unwrap().unwrap();
        assert!(lock.acquire(&id).await.unwrap().is_none());

        assert!(lock.release(token).await.unwrap());
        assert!(lock.acquire(&id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_are_unique_per_acquisition() {
        let store = MemoryStore::default();
        let lock = lock(&store);
        let a = lock.acquire(&ConversationId::from("a")).await.unwrap().unwrap();
        let b = lock.acquire(&ConversationId::from("b")).await.unwrap().unwrap();
        assert_ne!(a.value(), b.value());
        assert!(a.value().starts_with(&format!("{}-", std::process::id())));
        lock.release(a).await.unwrap();
        lock.release(b).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_release_keeps_successor_lock() {
        let store = MemoryStore::default();
        let lock = lock(&store);
        let id = ConversationId::from("c1");

        let stale = lock.acquire(&id).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let fresh = lock.acquire(&id).await.unwrap().unwrap();

        assert!(!lock.release(stale).await.unwrap());
        assert!(store.exists(&Keyspace::default().lock(&id)).await.unwrap());
        assert!(lock.release(fresh).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn lock_expires_on_its_own() {
        let store = MemoryStore::default();
        let lock = lock(&store);
        let id = ConversationId::from("c1");
        let _held = lock.acquire(&id).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(lock.acquire(&id).await.unwrap().is_some());
    }
}
