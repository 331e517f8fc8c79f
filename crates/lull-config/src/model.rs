// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level lull configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LullConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Key-value store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Conversation resolver settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Debounce buffer timings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Expiry/flush notifier settings.
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// HTTP ingress settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, attached to startup logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "lull".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Key-value store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Prefix of every key and channel lull writes.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Whether the in-process store publishes key-expiration events.
    #[serde(default = "default_true")]
    pub keyspace_events: bool,

    /// Sweep interval of the in-process store's expiry reaper.
    #[serde(default = "default_reaper_interval_ms")]
    pub reaper_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            keyspace_events: true,
            reaper_interval_ms: default_reaper_interval_ms(),
        }
    }
}

impl StoreConfig {
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

fn default_namespace() -> String {
    "lull".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reaper_interval_ms() -> u64 {
    250
}

/// Conversation resolver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Sliding TTL of conversation and alias records.
    #[serde(default = "default_conversation_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_conversation_ttl_secs(),
        }
    }
}

impl ConversationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_conversation_ttl_secs() -> u64 {
    4 * 60 * 60
}

/// Debounce buffer timings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Debounce window applied to messages arriving through the gateway.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Added to the window when arming the marker.
    #[serde(default = "default_marker_margin_secs")]
    pub marker_margin_secs: u64,

    /// Marker TTL once the sender goes idle with messages pending.
    #[serde(default = "default_idle_flush_delay_secs")]
    pub idle_flush_delay_secs: u64,

    /// Marker TTL after a flush check found the sender still active.
    #[serde(default = "default_defer_delay_secs")]
    pub defer_delay_secs: u64,

    /// Lifetime of a typing/recording signal without renewal.
    #[serde(default = "default_activity_ttl_secs")]
    pub activity_ttl_secs: u64,

    /// Safety TTL of the window data and metadata snapshot.
    #[serde(default = "default_window_ttl_secs")]
    pub window_ttl_secs: u64,

    /// Flush lock TTL.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Delay before a "paused" presence event is applied as idle.
    #[serde(default = "default_presence_idle_delay_ms")]
    pub presence_idle_delay_ms: u64,

    /// Extra delivery attempts for a flush event whose sink failed.
    #[serde(default = "default_delivery_retries")]
    pub delivery_retries: u32,

    /// Pause between delivery attempts.
    #[serde(default = "default_delivery_retry_delay_ms")]
    pub delivery_retry_delay_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            marker_margin_secs: default_marker_margin_secs(),
            idle_flush_delay_secs: default_idle_flush_delay_secs(),
            defer_delay_secs: default_defer_delay_secs(),
            activity_ttl_secs: default_activity_ttl_secs(),
            window_ttl_secs: default_window_ttl_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            presence_idle_delay_ms: default_presence_idle_delay_ms(),
            delivery_retries: default_delivery_retries(),
            delivery_retry_delay_ms: default_delivery_retry_delay_ms(),
        }
    }
}

impl BufferConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn presence_idle_delay(&self) -> Duration {
        Duration::from_millis(self.presence_idle_delay_ms)
    }

    pub fn delivery_retry_delay(&self) -> Duration {
        Duration::from_millis(self.delivery_retry_delay_ms)
    }
}

fn default_window_ms() -> u64 {
    2000
}

fn default_marker_margin_secs() -> u64 {
    2
}

fn default_idle_flush_delay_secs() -> u64 {
    4
}

fn default_defer_delay_secs() -> u64 {
    10
}

fn default_activity_ttl_secs() -> u64 {
    15
}

fn default_window_ttl_secs() -> u64 {
    3600
}

fn default_lock_ttl_secs() -> u64 {
    30
}

fn default_presence_idle_delay_ms() -> u64 {
    3000
}

fn default_delivery_retries() -> u32 {
    3
}

fn default_delivery_retry_delay_ms() -> u64 {
    500
}

/// Expiry/flush notifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    /// Listen for marker expirations in addition to explicit flush requests.
    #[serde(default = "default_true")]
    pub expiry_events: bool,

    /// Refuse to start when expiration events are unavailable.
    #[serde(default)]
    pub require_expiry_events: bool,

    /// Capacity of each store subscription.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            expiry_events: true,
            require_expiry_events: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

/// HTTP ingress configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP ingress.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on every `/v1` route.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Capacity of the flush-event broadcast feeding SSE clients.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[redacted]"))
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_event_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_documented_timings() {
        let config = LullConfig::default();
        assert_eq!(config.conversation.ttl(), Duration::from_secs(14_400));
        assert_eq!(config.buffer.window(), Duration::from_secs(2));
        assert_eq!(config.buffer.idle_flush_delay_secs, 4);
        assert_eq!(config.buffer.defer_delay_secs, 10);
        assert_eq!(config.buffer.activity_ttl_secs, 15);
        assert_eq!(config.buffer.lock_ttl_secs, 30);
        assert!(config.notifier.expiry_events);
        assert!(!config.notifier.require_expiry_events);
    }

    #[test]
    fn gateway_debug_redacts_token() {
        let config = GatewayConfig {
            bearer_token: Some("secret-token".into()),
            ..GatewayConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[redacted]"));
    }
}
