// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the lull debounce engine.
//!
//! This crate provides the foundational trait definitions, error types, the
//! key namespace, and the domain types shared by every other crate in the
//! workspace. Store backends and flush consumers implement traits defined here.

pub mod error;
pub mod keyspace;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LullError;
pub use keyspace::Keyspace;
pub use types::{
    ActivityStatus, AdapterType, BufferedMessage, Conversation, ConversationId, FlushEvent,
    HealthStatus,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    EXPIRED_EVENTS_CHANNEL, FlushSink, KeyTtl, KvStore, PluginAdapter, PubSubMessage, Subscription,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lull_error_has_all_variants() {
        let _config = LullError::Config("test".into());
        let _store = LullError::Store {
            source: Box::new(std::io::Error::other("test")),
        };
        let _codec = LullError::Codec {
            context: "window".into(),
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        let _gateway = LullError::Gateway {
            message: "test".into(),
            source: None,
        };
        let _timeout = LullError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = LullError::Internal("test".into());
    }

    #[test]
    fn adapter_type_round_trips_through_display() {
        use std::str::FromStr;

        for variant in [AdapterType::Store, AdapterType::Sink, AdapterType::Gateway] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn expired_events_channel_is_exported() {
        assert_eq!(EXPIRED_EVENTS_CHANNEL, traits::store::EXPIRED_EVENTS_CHANNEL);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_kv_store<T: KvStore>() {}
        fn _assert_flush_sink<T: FlushSink>() {}
    }
}
