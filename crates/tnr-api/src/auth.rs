//! # Authentication Middleware
//!
//! Bearer-token middleware that turns every authenticated request into an
//! explicit [`ActorContext`].
//!
//! ## Token Format
//!
//! ```text
//! Bearer {roles}:{user_id}:{secret}
//! Bearer {roles}:{user_id}:{province_id}:{secret}
//! ```
//!
//! `roles` is a comma-separated list of role names. Capabilities are the
//! union of each role's defaults. The secret is compared in constant time.
//!
//! When no token is configured the service runs in development mode and
//! every caller is an administrator (user 1).
//!
//! The recorded client origin is the socket peer address. Proxy headers
//! replace it only when [`AuthConfig::trust_proxy_headers`] is set.

use std::net::SocketAddr;
use std::str::FromStr;

use axum::extract::{ConnectInfo, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use tnr_core::{ActorContext, ProvinceId, Role, UserId};

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Caller ──────────────────────────────────────────────────────────────────

/// The authenticated actor, extracted from request extensions.
///
/// Handlers take `Caller` and pass the inner [`ActorContext`] explicitly
/// into every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub ActorContext);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ActorContext>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Expected shared secret (`None` disables authentication) and origin policy.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub trust_proxy_headers: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        // Keep timing independent of whether the lengths matched.
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

fn parse_roles(raw: &str) -> Result<Vec<Role>, String> {
    let roles = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| Role::from_str(r).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    if roles.is_empty() {
        return Err("token names no roles".into());
    }
    Ok(roles)
}

/// Parse and verify a bearer token into an actor.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<ActorContext, String> {
    let parts: Vec<&str> = provided.split(':').collect();
    let (roles, user, province, secret) = match parts.as_slice() {
        [roles, user, secret] => (*roles, *user, None, *secret),
        [roles, user, province, secret] => (*roles, *user, Some(*province), *secret),
        _ => {
            return Err(
                "invalid token format, expected {roles}:{user_id}:{secret} or {roles}:{user_id}:{province_id}:{secret}"
                    .into(),
            )
        }
    };

    if !constant_time_token_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }

    let roles = parse_roles(roles)?;
    let user_id = UserId::from_str(user).map_err(|e| e.to_string())?;
    let mut actor = ActorContext::new(user_id, roles);
    if let Some(raw) = province {
        actor = actor.with_province(ProvinceId::from_str(raw).map_err(|e| e.to_string())?);
    }
    Ok(actor)
}

/// Client network origin: proxy headers when trusted, else the peer address.
fn client_origin(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> Option<String> {
    let peer = peer.map(|addr| addr.ip().to_string());
    if !trust_proxy_headers {
        return peer;
    }
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
        .or(peer)
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validates the bearer token and injects the caller's [`ActorContext`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_config = request.extensions().get::<AuthConfig>().cloned();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let trust_proxy_headers = auth_config.as_ref().is_some_and(|c| c.trust_proxy_headers);
    let origin = client_origin(request.headers(), peer, trust_proxy_headers);

    let actor = match auth_config {
        Some(AuthConfig {
            token: Some(ref expected),
            ..
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
                Some(provided) => match parse_bearer_token(provided, expected) {
                    Ok(actor) => actor,
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        return unauthorized_response(&msg);
                    }
                },
                None if auth_header.is_some() => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    return unauthorized_response("authorization header must use Bearer scheme");
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    return unauthorized_response("missing authorization header");
                }
            }
        }
        _ => ActorContext::new(UserId(1), [Role::Admin]),
    };

    let actor = match origin {
        Some(origin) => actor.with_origin(origin),
        None => actor,
    };
    request.extensions_mut().insert(actor);
    next.run(request).await
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
