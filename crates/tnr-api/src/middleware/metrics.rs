//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in the
//! middleware. Workflow gauges (requests per status, claims held) are
//! refreshed from [`AppState`] on each `/metrics` scrape.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use prometheus::core::Collector;
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tnr_state::ClaimTrack;

use crate::state::AppState;

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,
    requests_by_status: GaugeVec,
    claims_held: GaugeVec,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Fresh registry with every metric registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("tnr_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("tnr_http_request_duration_seconds", "HTTP request duration in seconds")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("tnr_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )?;
        let requests_by_status = GaugeVec::new(
            Opts::new("tnr_requests_by_status", "Name-reservation requests by status"),
            &["status"],
        )?;
        let claims_held = GaugeVec::new(
            Opts::new("tnr_claims_held", "Review claims currently held, by track"),
            &["track"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(requests_by_status.clone()))?;
        registry.register(Box::new(claims_held.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                requests_by_status,
                claims_held,
            }),
        })
    }

    /// Total request count across all labels.
    pub fn requests(&self) -> u64 {
        counter_total(&self.inner.http_requests_total)
    }

    /// Total error count across all labels.
    pub fn errors(&self) -> u64 {
        counter_total(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Reset the workflow gauges to the current store contents.
    fn refresh_workflow_gauges(&self, state: &AppState) {
        let (by_status, audit_claims, ip_claims) = state.requests.read_with(|requests| {
            let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
            let mut audit = 0usize;
            let mut ip = 0usize;
            for r in requests.values() {
                *by_status.entry(r.status.as_str()).or_default() += 1;
                audit += usize::from(r.audit_claim.is_some());
                ip += usize::from(r.ip_claim.is_some());
            }
            (by_status, audit, ip)
        });

        self.inner.requests_by_status.reset();
        for (status, count) in by_status {
            self.inner
                .requests_by_status
                .with_label_values(&[status])
                .set(count as f64);
        }
        self.inner
            .claims_held
            .with_label_values(&[ClaimTrack::Audit.as_str()])
            .set(audit_claims as f64);
        self.inner
            .claims_held
            .with_label_values(&[ClaimTrack::Ip.as_str()])
            .set(ip_claims as f64);
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn counter_total(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace numeric path segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, start.elapsed().as_secs_f64());
    }

    response
}

/// GET /metrics: Prometheus scrape endpoint.
pub async fn metrics_handler(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> Response {
    metrics.refresh_workflow_gauges(&state);
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}
