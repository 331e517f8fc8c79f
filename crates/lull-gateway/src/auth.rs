// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token guard for the `/v1` routes.
//!
//! A gateway started without a token rejects every `/v1` request.

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::handlers::ErrorResponse;

/// Token the webhook sender must present.
#[derive(Clone)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = self.bearer_token.as_ref().map(|_| "[redacted]");
        f.debug_struct("AuthConfig")
            .field("bearer_token", &token)
            .finish()
    }
}

/// Result of checking one `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// No token configured on our side.
    Unconfigured,
    /// Header absent or not a bearer credential.
    Missing,
    Invalid,
}

impl AuthConfig {
    /// Checks the raw `Authorization` header value.
    pub fn verify(&self, authorization: Option<&str>) -> Verdict {
        let Some(expected) = self.bearer_token.as_deref().filter(|t| !t.is_empty()) else {
            return Verdict::Unconfigured;
        };
        let Some(presented) = authorization.and_then(bearer_credential) else {
            return Verdict::Missing;
        };
        if tokens_match(presented.as_bytes(), expected.as_bytes()) {
            Verdict::Accepted
        } else {
            Verdict::Invalid
        }
    }
}

/// The credential of a `Bearer` header. The scheme name is case-insensitive.
fn bearer_credential(value: &str) -> Option<&str> {
    let (scheme, credential) = value.split_once(' ')?;
    let credential = credential.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty()).then_some(credential)
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(ErrorResponse {
            error: reason.to_string(),
        }),
    )
        .into_response()
}

/// Route layer guarding every `/v1` route.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth.verify(authorization) {
        Verdict::Accepted => next.run(request).await,
        Verdict::Unconfigured => {
            error!("gateway has no bearer token configured, rejecting request");
            unauthorized("gateway authentication is not configured")
        }
        verdict => {
            debug!(path = %request.uri().path(), ?verdict, "rejected request");
            unauthorized("missing or invalid bearer token")
        }
    }
}
