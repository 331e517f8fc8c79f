// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup and creation over a [`KvStore`].
//!
//! Records are JSON-encoded [`Conversation`] values under
//! [`Keyspace::conversation`]; aliases are JSON-encoded ids under
//! [`Keyspace::alias`]. Both share the same sliding TTL, refreshed on every
//! touch, so an idle conversation expires silently and the next message
//! starts a new one.

use std::sync::Arc;
use std::time::Duration;

use lull_config::model::ConversationConfig;
use lull_core::{Conversation, ConversationId, Keyspace, KvStore, LullError};
use tracing::{debug, info, warn};

/// Resolves (agent, sender) pairs and aliases to conversation ids.
#[derive(Clone)]
pub struct ConversationResolver {
    store: Arc<dyn KvStore>,
    keys: Keyspace,
    ttl: Duration,
}

impl ConversationResolver {
    pub fn new(store: Arc<dyn KvStore>, keys: Keyspace, config: &ConversationConfig) -> Self {
        Self::with_ttl(store, keys, config.ttl())
    }

    pub fn with_ttl(store: Arc<dyn KvStore>, keys: Keyspace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    /// Returns the live conversation for (agent, sender), creating it if absent.
    ///
    /// An existing record gets its `last_message_at` bumped and its TTL
    /// refreshed. When `alias` is given, the alias mapping is (re)written with
    /// the same TTL. Creation is conditional, so concurrent first messages
    /// for the same pair converge on one id.
    pub async fn get_or_create(
        &self,
        agent_id: &str,
        sender_id: &str,
        alias: Option<&str>,
    ) -> Result<ConversationId, LullError> {
        let key = self.keys.conversation(agent_id, sender_id);
        let now = now_millis();

        if let Some(existing) = self.read(&key).await? {
            let id = self.touch(&key, existing, now).await?;
            self.write_alias(agent_id, alias, &id).await?;
            return Ok(id);
        }

        let created = Conversation {
            id: ConversationId::generate(),
            agent_id: agent_id.to_string(),
            sender_id: sender_id.to_string(),
            created_at: now,
            last_message_at: now,
        };
        let encoded = encode(&created, "conversation record")?;

        let id = if self.store.set_nx(&key, &encoded, self.ttl).await? {
            info!(
                conversation_id = %created.id,
                agent_id,
                sender_id,
                ttl_secs = self.ttl.as_secs(),
                "conversation created"
            );
            created.id
        } else {
            match self.read(&key).await? {
                Some(winner) => {
                    debug!(
                        conversation_id = %winner.id,
                        agent_id,
                        sender_id,
                        "conversation created concurrently, adopting existing id"
                    );
                    self.touch(&key, winner, now).await?
                }
                None => {
                    // The competing record vanished or is unreadable; take the slot.
                    self.store.set(&key, &encoded, Some(self.ttl)).await?;
                    created.id
                }
            }
        };

        self.write_alias(agent_id, alias, &id).await?;
        Ok(id)
    }

    /// Reads the conversation record for (agent, sender) without touching it.
    pub async fn get(
        &self,
        agent_id: &str,
        sender_id: &str,
    ) -> Result<Option<Conversation>, LullError> {
        self.read(&self.keys.conversation(agent_id, sender_id))
            .await
    }

    /// Looks up the conversation an alias points to. Never refreshes anything.
    pub async fn resolve_by_alias(
        &self,
        agent_id: &str,
        alias: &str,
    ) -> Result<Option<ConversationId>, LullError> {
        let key = self.keys.alias(agent_id, alias);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<ConversationId>(&raw) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!(key = %key, error = %e, "alias mapping is not valid JSON, ignoring");
                Ok(None)
            }
        }
    }

    pub async fn exists(&self, agent_id: &str, sender_id: &str) -> Result<bool, LullError> {
        self.store
            .exists(&self.keys.conversation(agent_id, sender_id))
            .await
    }

    /// Removes the conversation record. Alias mappings are left to expire.
    pub async fn delete(&self, agent_id: &str, sender_id: &str) -> Result<(), LullError> {
        let removed = self
            .store
            .del(&[self.keys.conversation(agent_id, sender_id)])
            .await?;
        debug!(agent_id, sender_id, removed, "conversation deleted");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Conversation>, LullError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Conversation>(&raw) {
            Ok(conversation) => Ok(Some(conversation)),
            Err(e) => {
                warn!(key, error = %e, "conversation record is not valid JSON, treating as absent");
                Ok(None)
            }
        }
    }

    async fn touch(
        &self,
        key: &str,
        mut conversation: Conversation,
        now: i64,
    ) -> Result<ConversationId, LullError> {
        conversation.last_message_at = now;
        let encoded = encode(&conversation, "conversation record")?;
        self.store.set(key, &encoded, Some(self.ttl)).await?;
        Ok(conversation.id)
    }

    async fn write_alias(
        &self,
        agent_id: &str,
        alias: Option<&str>,
        id: &ConversationId,
    ) -> Result<(), LullError> {
        let Some(alias) = alias.filter(|a| !a.is_empty()) else {
            return Ok(());
        };
        let encoded = encode(id, "alias mapping")?;
        self.store
            .set(&self.keys.alias(agent_id, alias), &encoded, Some(self.ttl))
            .await?;
        debug!(conversation_id = %id, agent_id, alias, "alias mapped");
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T, context: &str) -> Result<String, LullError> {
    serde_json::to_string(value).map_err(|e| LullError::codec(context, e))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
