// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key and channel naming for everything lull keeps in the shared store.
//!
//! Every purpose gets its own stable prefix under a configurable namespace,
//! so several logical users of one store never collide:
//!
//! ```text
//! <ns>:conversation:<agent>:<sender>   conversation record
//! <ns>:alias:<agent>:<alias>           alias -> conversation id
//! <ns>:window:<conversation>           accumulated messages
//! <ns>:marker:<conversation>           TTL marker driving flush checks
//! <ns>:activity:<conversation>         typing / recording status
//! <ns>:metadata:<conversation>         metadata snapshot
//! <ns>:lock:<conversation>             flush lock
//! <ns>:flush:<conversation>            pub/sub flush-check channel
//! ```

use crate::types::ConversationId;

const CONVERSATION: &str = "conversation";
const ALIAS: &str = "alias";
const WINDOW: &str = "window";
const MARKER: &str = "marker";
const ACTIVITY: &str = "activity";
const METADATA: &str = "metadata";
const LOCK: &str = "lock";
const FLUSH_CHANNEL: &str = "flush";

/// Builds namespaced keys and channel names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    namespace: String,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new("lull")
    }
}

impl Keyspace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn prefix(&self, purpose: &str) -> String {
        format!("{}:{purpose}:", self.namespace)
    }

    /// Whether `agent_id` can lead a conversation or alias key. The agent id
    /// must not contain `:`, or `a:b` + `c` and `a` + `b:c` would share a key.
    pub fn accepts_agent_id(agent_id: &str) -> bool {
        !agent_id.is_empty() && !agent_id.contains(':')
    }

    pub fn conversation(&self, agent_id: &str, sender_id: &str) -> String {
        format!("{}{agent_id}:{sender_id}", self.prefix(CONVERSATION))
    }

    pub fn alias(&self, agent_id: &str, alias: &str) -> String {
        format!("{}{agent_id}:{alias}", self.prefix(ALIAS))
    }

    pub fn window(&self, id: &ConversationId) -> String {
        format!("{}{id}", self.prefix(WINDOW))
    }

    pub fn marker(&self, id: &ConversationId) -> String {
        format!("{}{id}", self.prefix(MARKER))
    }

    pub fn activity(&self, id: &ConversationId) -> String {
        format!("{}{id}", self.prefix(ACTIVITY))
    }

    pub fn metadata(&self, id: &ConversationId) -> String {
        format!("{}{id}", self.prefix(METADATA))
    }

    pub fn lock(&self, id: &ConversationId) -> String {
        format!("{}{id}", self.prefix(LOCK))
    }

    pub fn flush_channel(&self, id: &ConversationId) -> String {
        format!("{}{id}", self.prefix(FLUSH_CHANNEL))
    }

    /// Pattern matching every conversation's flush-check channel.
    pub fn flush_channel_pattern(&self) -> String {
        format!("{}*", self.prefix(FLUSH_CHANNEL))
    }

    /// Conversation id carried by a marker key, or `None` for any other key.
    pub fn conversation_from_marker(&self, key: &str) -> Option<ConversationId> {
        strip_id(key, &self.prefix(MARKER))
    }

    /// Conversation id carried by a flush-check channel name.
    pub fn conversation_from_channel(&self, channel: &str) -> Option<ConversationId> {
        strip_id(channel, &self.prefix(FLUSH_CHANNEL))
    }

    /// All per-window keys removed together on a successful flush.
    pub fn window_keys(&self, id: &ConversationId) -> Vec<String> {
        vec![
            self.marker(id),
            self.window(id),
            self.activity(id),
            self.metadata(id),
        ]
    }
}

fn strip_id(value: &str, prefix: &str) -> Option<ConversationId> {
    value
        .strip_prefix(prefix)
        .filter(|id| !id.is_empty())
        .map(ConversationId::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn keys_are_partitioned_by_purpose() {
        let ks = Keyspace::new("app");
        let id = ConversationId::from("c1");
        let keys = [
            ks.window(&id),
            ks.marker(&id),
            ks.activity(&id),
            ks.metadata(&id),
            ks.lock(&id),
            ks.flush_channel(&id),
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        assert!(keys.iter().all(|k| k.starts_with("app:")));
        assert_eq!(ks.conversation("agent", "5511"), "app:conversation:agent:5511");
        assert_eq!(ks.alias("agent", "lid9"), "app:alias:agent:lid9");
    }

    #[test]
    fn agent_ids_with_separator_are_refused() {
        assert!(Keyspace::accepts_agent_id("agent-1"));
        assert!(!Keyspace::accepts_agent_id("a:b"));
        assert!(!Keyspace::accepts_agent_id(""));

        let ks = Keyspace::default();
        assert_eq!(ks.conversation("a:b", "c"), ks.conversation("a", "b:c"));
    }

    #[test]
    fn non_marker_keys_do_not_parse() {
        let ks = Keyspace::default();
        let id = ConversationId::from("c1");
        assert_eq!(ks.conversation_from_marker(&ks.window(&id)), None);
        assert_eq!(ks.conversation_from_marker(&ks.lock(&id)), None);
        assert_eq!(ks.conversation_from_marker("lull:marker:"), None);
        assert_eq!(ks.conversation_from_marker("other:marker:c1"), None);
    }

    #[test]
    fn window_keys_cover_everything_but_the_lock() {
        let ks = Keyspace::default();
        let id = ConversationId::from("c1");
        let keys = ks.window_keys(&id);
        assert_eq!(keys.len(), 4);
        assert!(!keys.contains(&ks.lock(&id)));
    }

    proptest! {
        #[test]
        fn marker_and_channel_recover_the_conversation(id in "[0-9a-zA-Z:_-]{1,40}") {
            let ks = Keyspace::new("ns");
            let conversation = ConversationId::from(id.as_str());
            prop_assert_eq!(ks.conversation_from_marker(&ks.marker(&conversation)), Some(conversation.clone()));
            prop_assert_eq!(ks.conversation_from_channel(&ks.flush_channel(&conversation)), Some(conversation));
        }
    }
}
