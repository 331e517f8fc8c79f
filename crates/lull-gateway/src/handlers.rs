// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook ingress and conversation API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lull_core::{
    ActivityStatus, BufferedMessage, ConversationId, HealthStatus, Keyspace, LullError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::server::GatewayState;

/// Message payload inside a webhook delivery.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
}

fn default_message_type() -> String {
    "text".to_string()
}

impl From<InboundMessage> for BufferedMessage {
    fn from(message: InboundMessage) -> Self {
        BufferedMessage {
            id: message.id,
            text: message.text,
            media_type: message.media_type,
            kind: message.kind,
        }
    }
}

/// Request body for `POST /v1/webhook/{agent_id}/messages`.
#[derive(Debug, Deserialize)]
pub struct WebhookMessageRequest {
    /// Sender identifier (e.g. phone number).
    pub sender: String,
    /// Channel-specific secondary identifier, mapped to the conversation.
    #[serde(default)]
    pub alias: Option<String>,
    pub message: InboundMessage,
    /// Credential the downstream consumer needs to reply; stored in the snapshot.
    #[serde(default)]
    pub token: Option<String>,
}

/// Response body for `POST /v1/webhook/{agent_id}/messages`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessageResponse {
    pub conversation_id: ConversationId,
    pub message_count: usize,
    pub message: String,
}

/// Request body for `POST /v1/webhook/{agent_id}/presence`.
#[derive(Debug, Deserialize)]
pub struct WebhookPresenceRequest {
    /// The sender's alias, as delivered by presence events.
    pub sender: String,
    /// `composing`, `recording`, `paused`, or `available`.
    pub state: String,
}

/// Response body for presence deliveries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    pub message: String,
}

/// Response body for `GET /v1/conversations/{id}/activity`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub conversation_id: ConversationId,
    pub status: ActivityStatus,
}

/// Response body for `POST /v1/conversations/{id}/flush`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResponse {
    pub conversation_id: ConversationId,
    /// Number of notifiers that received the request.
    pub receivers: u64,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub store: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn invalid_agent_id(agent_id: &str) -> Response {
    debug!(agent_id, "rejected agent id");
    error_response(
        StatusCode::BAD_REQUEST,
        "agent id must be non-empty and must not contain ':'",
    )
}

fn store_failure(e: LullError) -> Response {
    error!(error = %e, "request failed");
    error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

/// Maps a presence state from the channel to an activity status.
///
/// `None` means the state is not one we act on.
pub fn presence_status(state: &str) -> Option<ActivityStatus> {
    match state {
        "composing" => Some(ActivityStatus::Typing),
        "recording" => Some(ActivityStatus::Recording),
        "paused" | "available" => Some(ActivityStatus::Idle),
        _ => None,
    }
}

/// POST /v1/webhook/{agent_id}/messages
///
/// Resolves the conversation, marks the sender idle, and appends the message
/// to the debounce window.
pub async fn post_webhook_message(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
    Json(body): Json<WebhookMessageRequest>,
) -> Response {
    if !Keyspace::accepts_agent_id(&agent_id) {
        return invalid_agent_id(&agent_id);
    }
    if body.sender.is_empty() || body.message.id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "sender and message.id are required");
    }

    let id = match state
        .resolver
        .get_or_create(&agent_id, &body.sender, body.alias.as_deref())
        .await
    {
        Ok(id) => id,
        Err(e) => return store_failure(e),
    };

    if let Err(e) = state.engine.set_activity(&id, ActivityStatus::Idle).await {
        return store_failure(e);
    }

    let metadata = serde_json::json!({
        "agentId": agent_id,
        "sender": body.sender,
        "token": body.token,
    });
    match state
        .engine
        .add_message(&id, body.message.into(), Some(metadata), state.timings.window)
        .await
    {
        Ok(message_count) => (
            StatusCode::OK,
            Json(WebhookMessageResponse {
                conversation_id: id,
                message_count,
                message: "message buffered".to_string(),
            }),
        )
            .into_response(),
        Err(e) => store_failure(e),
    }
}

/// POST /v1/webhook/{agent_id}/presence
///
/// Typing and recording apply immediately. Paused and available apply as
/// idle after the configured delay, on a task the gateway waits for when it
/// shuts down.
pub async fn post_webhook_presence(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
    Json(body): Json<WebhookPresenceRequest>,
) -> Response {
    debug!(agent_id, alias = %body.sender, state = %body.state, "presence received");
    if !Keyspace::accepts_agent_id(&agent_id) {
        return invalid_agent_id(&agent_id);
    }

    let ignored = |reason: &str| {
        (
            StatusCode::OK,
            Json(PresenceResponse {
                conversation_id: None,
                message: reason.to_string(),
            }),
        )
            .into_response()
    };

    let Some(status) = presence_status(&body.state) else {
        return ignored("presence state ignored");
    };

    let id = match state.resolver.resolve_by_alias(&agent_id, &body.sender).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            debug!(agent_id, alias = %body.sender, "no conversation for alias, presence ignored");
            return ignored("conversation not found, presence ignored");
        }
        Err(e) => return store_failure(e),
    };

    if status.is_active() {
        if let Err(e) = state.engine.set_activity(&id, status).await {
            return store_failure(e);
        }
    } else {
        let engine = state.engine.clone();
        let delay = state.timings.presence_idle_delay;
        let conversation_id = id.clone();
        state.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            match engine.set_activity(&conversation_id, ActivityStatus::Idle).await {
                Ok(()) => info!(conversation_id = %conversation_id, "sender idle after presence delay"),
                Err(e) => {
                    warn!(conversation_id = %conversation_id, error = %e, "failed to apply delayed idle")
                }
            }
        });
    }

    (
        StatusCode::OK,
        Json(PresenceResponse {
            conversation_id: Some(id),
            message: format!("presence applied: {status}"),
        }),
    )
        .into_response()
}

/// GET /v1/conversations/{id}/activity
pub async fn get_activity(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    let id = ConversationId::from(id);
    match state.engine.activity(&id).await {
        Ok(status) => Json(ActivityResponse {
            conversation_id: id,
            status,
        })
        .into_response(),
        Err(e) => store_failure(e),
    }
}

/// POST /v1/conversations/{id}/flush
///
/// Publishes an explicit flush request. The flush itself still goes through
/// the lock and the activity check.
pub async fn post_flush(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    let id = ConversationId::from(id);
    match state.engine.request_flush(&id).await {
        Ok(receivers) => (
            StatusCode::ACCEPTED,
            Json(FlushResponse {
                conversation_id: id,
                receivers,
            }),
        )
            .into_response(),
        Err(e) => store_failure(e),
    }
}

/// GET /health
///
/// Unauthenticated. Returns 503 when the store is unhealthy.
pub async fn get_public_health(State(state): State<GatewayState>) -> Response {
    let (status_code, status, store) = match state.health.store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "ok", "healthy".to_string()),
        Ok(HealthStatus::Degraded(why)) => (StatusCode::OK, "degraded", why),
        Ok(HealthStatus::Unhealthy(why)) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", why),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", e.to_string()),
    };
    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.health.start_time.elapsed().as_secs(),
            store,
        }),
    )
        .into_response()
}
