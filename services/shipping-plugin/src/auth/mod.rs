//! Inbound request middleware: JWT authentication, caller-ip resolution,
//! and request timing.
//!
//! # Purpose
//! Every RPC traverses three layers in order: authentication (HMAC-SHA256
//! host JWT, `store_id` claim becomes the tenant id), peer/forwarded-for
//! resolution, and a timing logger. Auth failures are transport-level 401s;
//! everything after the auth layer speaks `ResultResponse`.
use crate::app::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;

/// Authenticated tenant for the request. `None` only when auth is skipped
/// via the local-testing escape hatch; handlers then fall back to the
/// client id embedded in the request body.
#[derive(Debug, Clone, Copy)]
pub struct AuthTenant(pub Option<i64>);

/// Resolved caller address: first `x-forwarded-for` hop, else the socket
/// peer.
#[derive(Debug, Clone)]
pub struct CallerIp(pub String);

/// Claims minted by the host platform for plugin calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostClaims {
    pub store_id: u64,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub iss: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization metadata is missing")]
    MissingHeader,
    #[error("jwt error: {0}")]
    InvalidToken(String),
    #[error("missing store_id")]
    MissingStoreId,
}

pub fn verify_host_token(secret: &str, token: &str) -> Result<HostClaims, AuthError> {
    let token = token.trim();
    let token = if token.len() >= 7 && token[..7].eq_ignore_ascii_case("bearer ") {
        token[7..].trim()
    } else {
        token
    };
    if token.is_empty() {
        return Err(AuthError::MissingHeader);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp"]);
    let decoded = jsonwebtoken::decode::<HostClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| AuthError::InvalidToken(err.to_string()))?;

    let claims = decoded.claims;
    if claims.iat == 0 {
        return Err(AuthError::InvalidToken("missing iat".to_string()));
    }
    if claims.store_id == 0 {
        return Err(AuthError::MissingStoreId);
    }
    Ok(claims)
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.config.skip_auth {
        tracing::warn!("auth skipped (PORTAGE_SKIP_AUTH=true)");
        request.extensions_mut().insert(AuthTenant(None));
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if header.trim().is_empty() {
        return unauthorized(&AuthError::MissingHeader);
    }

    match verify_host_token(&state.config.app_secret, header) {
        Ok(claims) => {
            request
                .extensions_mut()
                .insert(AuthTenant(Some(claims.store_id as i64)));
            next.run(request).await
        }
        Err(err) => unauthorized(&err),
    }
}

fn unauthorized(err: &AuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        format!("authorization is missing/expired (Reason: {err})"),
    )
        .into_response()
}

pub async fn resolve_caller_ip(mut request: Request, next: Next) -> Response {
    // The user's address is always the first forwarded-for hop.
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let caller = forwarded.unwrap_or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    });
    request.extensions_mut().insert(CallerIp(caller));
    next.run(request).await
}

pub async fn time_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    metrics::histogram!(
        "plugin_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.clone(),
    )
    .record(elapsed.as_secs_f64());
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "request"
    );
    response
}
