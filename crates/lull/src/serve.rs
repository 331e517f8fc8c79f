// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lull serve` command implementation.
//!
//! Wires the in-process store, the conversation resolver, the debounce engine
//! and its sinks, the flush notifier, and the webhook gateway, then runs until
//! SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Instant;

use lull_buffer::{
    BufferTimings, DebounceBuffer, FanoutSink, FlushNotifier, LogSink, NotifierHandle, RetrySink,
};
use lull_config::LullConfig;
use lull_config::model::BufferConfig;
use lull_conversation::ConversationResolver;
use lull_core::{FlushSink, Keyspace, KvStore, LullError, PluginAdapter};
use lull_gateway::auth::AuthConfig;
use lull_gateway::{BroadcastSink, Gateway, GatewayState, HealthState, IngressTimings, ServerConfig};
use lull_store::{MemoryStore, MemoryStoreConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::shutdown;

/// Crates whose logs follow `service.log_level`. Everything else logs at warn.
const LOG_TARGETS: &[&str] = &[
    "lull",
    "lull_core",
    "lull_config",
    "lull_store",
    "lull_conversation",
    "lull_buffer",
    "lull_gateway",
];

/// Runs the `lull serve` command.
pub async fn run_serve(config: LullConfig) -> Result<(), LullError> {
    init_tracing(&config.service.log_level);

    info!(name = %config.service.name, "starting lull serve");

    let cancel = shutdown::install_signal_handler();
    let services = Services::start(&config, cancel.clone()).await?;

    cancel.cancelled().await;
    services.shutdown().await?;

    info!("lull serve shutdown complete");
    Ok(())
}

/// Everything `lull serve` keeps running.
struct Services {
    store: MemoryStore,
    sink: Arc<dyn FlushSink>,
    notifier: NotifierHandle,
    reaper: JoinHandle<()>,
    gateway: Option<Gateway>,
}

impl Services {
    /// Builds and starts every component. Background tasks stop when `cancel` fires.
    async fn start(config: &LullConfig, cancel: CancellationToken) -> Result<Self, LullError> {
        let keys = Keyspace::new(config.store.namespace.clone());

        let store = MemoryStore::new(MemoryStoreConfig {
            keyspace_events: config.store.keyspace_events,
            reaper_interval: config.store.reaper_interval(),
            subscription_capacity: config.notifier.channel_capacity,
        });
        let reaper = store.spawn_reaper(cancel.clone());
        let shared: Arc<dyn KvStore> = Arc::new(store.clone());
        info!(
            namespace = %config.store.namespace,
            keyspace_events = config.store.keyspace_events,
            "in-process store ready"
        );

        let resolver = ConversationResolver::new(shared.clone(), keys.clone(), &config.conversation);

        let broadcast = BroadcastSink::new(config.gateway.event_capacity);
        let sink = build_sink(&config.buffer, &broadcast);
        let engine = DebounceBuffer::new(
            shared.clone(),
            keys,
            BufferTimings::from(&config.buffer),
            sink.clone(),
        );

        let notifier = FlushNotifier::new(engine.clone(), &config.notifier)
            .start(cancel.clone())
            .await?;

        let gateway = if config.gateway.enabled {
            let state = GatewayState {
                resolver,
                engine,
                events: broadcast.sender(),
                timings: IngressTimings::from(&config.buffer),
                auth: AuthConfig {
                    bearer_token: config.gateway.bearer_token.clone(),
                },
                health: HealthState {
                    start_time: Instant::now(),
                    store: shared,
                },
                tasks: TaskTracker::new(),
            };
            let gateway = Gateway::new(ServerConfig::from(&config.gateway), state, cancel);
            gateway.start().await?;
            Some(gateway)
        } else {
            info!("gateway disabled");
            None
        };

        Ok(Self {
            store,
            sink,
            notifier,
            reaper,
            gateway,
        })
    }

    /// Waits for every component to stop. The cancellation token must have fired.
    async fn shutdown(self) -> Result<(), LullError> {
        if let Some(gateway) = &self.gateway {
            gateway.shutdown().await?;
        }
        self.notifier.join().await;
        if let Err(e) = self.reaper.await {
            warn!(error = %e, "store reaper task failed");
        }
        self.sink.shutdown().await?;
        self.store.shutdown().await?;
        Ok(())
    }
}

/// Log sink plus SSE broadcast, retried as a unit.
fn build_sink(buffer: &BufferConfig, broadcast: &BroadcastSink) -> Arc<dyn FlushSink> {
    let sinks: Vec<Arc<dyn FlushSink>> = vec![Arc::new(LogSink), Arc::new(broadcast.clone())];
    let fanout = FanoutSink::new(sinks);
    Arc::new(RetrySink::new(
        Arc::new(fanout),
        buffer.delivery_retries,
        buffer.delivery_retry_delay(),
    ))
}

fn filter_directives(log_level: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use lull_core::{BufferedMessage, ConversationId, FlushEvent, HealthStatus};

    fn event() -> FlushEvent {
        FlushEvent {
            conversation_id: ConversationId::from("c1"),
            messages: vec![BufferedMessage::text("m1", "hi")],
            message_count: 1,
            metadata: None,
        }
    }

    #[test]
    fn filter_covers_every_workspace_crate() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("lull=debug,lull_core=debug"));
        assert!(directives.contains("lull_gateway=debug"));
        assert!(directives.ends_with(",warn"));
    }

    #[tokio::test]
    async fn flush_events_reach_sse_subscribers() {
        let broadcast = BroadcastSink::new(4);
        let mut rx = broadcast.sender().subscribe();
        let sink = build_sink(&BufferConfig::default(), &broadcast);

        sink.deliver(event()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().conversation_id.as_str(), "c1");
    }

    #[tokio::test]
    async fn services_start_and_stop() {
        let mut config = LullConfig::default();
        config.gateway.port = 0;
        config.gateway.bearer_token = Some("token".into());

        let cancel = CancellationToken::new();
        let services = Services::start(&config, cancel.clone()).await.unwrap();
        let gateway = services.gateway.as_ref().unwrap();
        assert_eq!(gateway.health_check().await.unwrap(), HealthStatus::Healthy);

        cancel.cancel();
        services.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn services_run_without_gateway() {
        let mut config = LullConfig::default();
        config.gateway.enabled = false;

        let cancel = CancellationToken::new();
        let services = Services::start(&config, cancel.clone()).await.unwrap();
        assert!(services.gateway.is_none());

        cancel.cancel();
        services.shutdown().await.unwrap();
    }
}
