// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lull check-config` output.

use std::fmt::Write;

use lull_config::LullConfig;

/// Human-readable summary of a validated configuration.
///
/// The bearer token is never printed, only whether one is set.
pub fn summary(config: &LullConfig) -> String {
    let mut out = String::new();
    let buffer = &config.buffer;
    let gateway = &config.gateway;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "lull: configuration ok ({})", config.service.name);
    let _ = writeln!(out, "  log level:        {}", config.service.log_level);
    let _ = writeln!(
        out,
        "  store:            in-process, namespace \"{}\", expiry events {}",
        config.store.namespace,
        on_off(config.store.keyspace_events)
    );
    let _ = writeln!(
        out,
        "  conversation ttl: {}s",
        config.conversation.ttl_secs
    );
    let _ = writeln!(
        out,
        "  debounce window:  {}ms (+{}s marker margin)",
        buffer.window_ms, buffer.marker_margin_secs
    );
    let _ = writeln!(
        out,
        "  flush delays:     idle {}s, defer {}s, activity ttl {}s",
        buffer.idle_flush_delay_secs, buffer.defer_delay_secs, buffer.activity_ttl_secs
    );
    let _ = writeln!(
        out,
        "  delivery:         {} retries, {}ms apart",
        buffer.delivery_retries, buffer.delivery_retry_delay_ms
    );
    let _ = writeln!(
        out,
        "  notifier:         expiry events {}{}",
        on_off(config.notifier.expiry_events),
        if config.notifier.require_expiry_events {
            " (required)"
        } else {
            ""
        }
    );
    if gateway.enabled {
        let _ = write!(
            out,
            "  gateway:          http://{}:{} (bearer token {})",
            gateway.host,
            gateway.port,
            if gateway.bearer_token.is_some() {
                "set"
            } else {
                "missing"
            }
        );
    } else {
        let _ = write!(out, "  gateway:          disabled");
    }
    out
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_hides_bearer_token() {
        let mut config = LullConfig::default();
        config.gateway.bearer_token = Some("super-secret".into());
        let text = summary(&config);
        assert!(text.contains("bearer token set"));
        assert!(!text.contains("super-secret"));
    }

    #[test]
    fn summary_reports_disabled_gateway() {
        let mut config = LullConfig::default();
        config.gateway.enabled = false;
        config.notifier.require_expiry_events = true;
        let text = summary(&config);
        assert!(text.contains("gateway:          disabled"));
        assert!(text.contains("expiry events on (required)"));
        assert!(text.contains("2000ms"));
    }
}
