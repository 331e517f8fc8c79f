// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP ingress for the lull debounce engine.
//!
//! Receives message and presence webhooks from the messaging channel, exposes
//! per-conversation activity and explicit flush requests, and streams flush
//! events to subscribers over Server-Sent Events.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod sse;

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use lull_core::{AdapterType, HealthStatus, LullError, PluginAdapter};

pub use crate::server::{GatewayState, HealthState, IngressTimings, ServerConfig, router};
pub use crate::sse::BroadcastSink;

/// The gateway as a managed adapter: owns the server task.
pub struct Gateway {
    config: ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
    server_handle: Mutex<Option<tokio::task::JoinHandle<Result<(), LullError>>>>,
}

impl Gateway {
    /// The server stops when `cancel` (or a child of it) fires.
    pub fn new(config: ServerConfig, state: GatewayState, cancel: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel: cancel.child_token(),
            server_handle: Mutex::new(None),
        }
    }

    /// Binds the listener and spawns the server. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, LullError> {
        let listener = server::bind(&self.config).await?;
        let addr = listener.local_addr().map_err(|e| LullError::Gateway {
            message: format!("gateway listener has no local address: {e}"),
            source: Some(Box::new(e)),
        })?;

        let state = self.state.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(server::serve(listener, state, cancel));
        *self.server_handle.lock().await = Some(handle);
        tracing::info!(%addr, "gateway started");
        Ok(addr)
    }

    /// Waits for the server task to end and returns its result.
    pub async fn wait(&self) -> Result<(), LullError> {
        let handle = self.server_handle.lock().await.take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| LullError::Internal(format!("gateway task failed: {e}")))?,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PluginAdapter for Gateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, LullError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(h) if !h.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server stopped".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), LullError> {
        self.cancel.cancel();
        let served = self.wait().await;

        let tasks = &self.state.tasks;
        tasks.close();
        if !tasks.is_empty() {
            tracing::debug!(pending = tasks.len(), "waiting for delayed presence updates");
        }
        tasks.wait().await;
        served
    }
}
