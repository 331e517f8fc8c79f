// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every problem instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::LullConfig;

pub fn validate_config(config: &LullConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let namespace = config.store.namespace.trim();
    if namespace.is_empty() {
        fail("store.namespace must not be empty".to_string());
    } else if namespace.contains(['*', '?']) {
        fail(format!(
            "store.namespace `{namespace}` must not contain glob characters"
        ));
    }

    if config.store.reaper_interval_ms == 0 {
        fail("store.reaper_interval_ms must be greater than zero".to_string());
    }

    if config.conversation.ttl_secs == 0 {
        fail("conversation.ttl_secs must be greater than zero".to_string());
    }

    let buffer = &config.buffer;
    for (key, value) in [
        ("buffer.window_ms", buffer.window_ms),
        ("buffer.idle_flush_delay_secs", buffer.idle_flush_delay_secs),
        ("buffer.defer_delay_secs", buffer.defer_delay_secs),
        ("buffer.activity_ttl_secs", buffer.activity_ttl_secs),
        ("buffer.window_ttl_secs", buffer.window_ttl_secs),
        ("buffer.lock_ttl_secs", buffer.lock_ttl_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    // Window data must outlive every marker TTL, or a flush finds nothing to send.
    let longest_marker = (buffer.window_ms.div_ceil(1000) + buffer.marker_margin_secs)
        .max(buffer.idle_flush_delay_secs)
        .max(buffer.defer_delay_secs);
    if buffer.window_ttl_secs < longest_marker {
        fail(format!(
            "buffer.window_ttl_secs ({}) must be at least the longest marker TTL ({longest_marker}s)",
            buffer.window_ttl_secs
        ));
    }

    if config.notifier.channel_capacity == 0 {
        fail("notifier.channel_capacity must be greater than zero".to_string());
    }
    if config.notifier.require_expiry_events && !config.notifier.expiry_events {
        fail(
            "notifier.require_expiry_events needs notifier.expiry_events = true".to_string(),
        );
    }

    let gateway = &config.gateway;
    if gateway.enabled {
        let host = gateway.host.trim();
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }

        match gateway.bearer_token.as_deref().map(str::trim) {
            None | Some("") => fail(
                "gateway.bearer_token is required when the gateway is enabled".to_string(),
            ),
            Some(_) => {}
        }

        if gateway.event_capacity == 0 {
            fail("gateway.event_capacity must be greater than zero".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
