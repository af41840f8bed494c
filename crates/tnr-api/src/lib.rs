//! # tnr-api: HTTP Service for the Trade Name Registry
//!
//! Exposes the name-reservation workflow over HTTP. The in-memory store is
//! authoritative; Postgres, when configured, is a write-through copy plus
//! the audit chain.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                 | Domain               |
//! |------------------------|------------------------|----------------------|
//! | `/v1/names/*`          | [`routes::names`]      | Name availability    |
//! | `/v1/fees/*`           | [`routes::fees`]       | Fee quotes           |
//! | `/v1/requests/*`       | [`routes::requests`]   | Request lifecycle    |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Whether `/metrics` and the metrics middleware are mounted.
/// Set `TNR_METRICS_ENABLED=false` to turn them off.
fn metrics_enabled() -> bool {
    std::env::var("TNR_METRICS_ENABLED")
        .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(true)
}

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
        trust_proxy_headers: state.config.trust_proxy_headers,
    };
    let metrics = if metrics_enabled() {
        match ApiMetrics::new() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::error!(error = %e, "metrics registry could not be built, metrics disabled");
                None
            }
        }
    } else {
        None
    };

    // Authenticated API routes.
    let mut api = Router::new()
        .merge(routes::names::router())
        .merge(routes::fees::router())
        .merge(routes::requests::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware));
    if let Some(m) = &metrics {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(axum::Extension(m.clone()));
    }
    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated probes.
    let mut probes = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));
    if let Some(m) = metrics {
        probes = probes
            .route("/metrics", get(middleware::metrics::metrics_handler))
            .layer(axum::Extension(m));
    }

    Router::new().merge(probes.with_state(state)).merge(api)
}

/// Liveness probe: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
