//! # tnr-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the Trade Name Registry.
//! Binds to configurable port (default 8080).

use tnr_api::state::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing. LOG_FORMAT=json selects the JSON formatter.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set: authentication disabled, every caller is an admin");
    }
    let trust_proxy_headers = std::env::var("TRUST_PROXY_HEADERS")
        .is_ok_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"));
    let config = AppConfig {
        port,
        auth_token,
        trust_proxy_headers,
    };

    // Initialize database pool (optional; absent means in-memory only).
    let db_pool = tnr_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    // Bootstrap: load the registry configuration if REGISTRY_CONFIG is set.
    let state = tnr_api::bootstrap::bootstrap(config, db_pool).map_err(|e| {
        tracing::error!("Bootstrap failed: {e}");
        e
    })?;

    // Hydrate the in-memory store from the database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    // A broken chain is reported, not fatal: the service stays available.
    state.verify_audit_chain().await.map_err(|e| {
        tracing::error!("Audit chain verification failed: {e}");
        e
    })?;

    let app = tnr_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Trade Name Registry API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
