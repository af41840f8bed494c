//! # OpenAPI Document
//!
//! Assembles the utoipa-documented routes into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trade Name Registry API",
        version = "0.3.2",
        description = "Name-reservation workflow: name checks, submissions, payment, audit and IP review claims, leadership review, registry finalization and striking.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::names::check_name,
        crate::routes::fees::quote_fee,
        crate::routes::requests::create_request,
        crate::routes::requests::list_requests,
        crate::routes::requests::get_request,
        crate::routes::requests::get_history,
        crate::routes::requests::confirm_payment,
        crate::routes::requests::take_claim,
        crate::routes::requests::release_claim,
        crate::routes::requests::transition,
        crate::routes::requests::submit_ip_report,
        crate::routes::requests::finalize_registry,
        crate::routes::requests::strike_name,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::names::NameCheckResponse,
        crate::routes::fees::FeeQuoteResponse,
        crate::routes::requests::CreateRequestBody,
        crate::routes::requests::PurposeBody,
        crate::routes::requests::ChecklistBody,
        crate::routes::requests::PaymentBody,
        crate::routes::requests::TransitionBody,
        crate::routes::requests::IpReportBody,
        crate::routes::requests::RegistryBody,
        crate::routes::requests::StrikeBody,
        crate::routes::requests::RequestView,
        crate::routes::requests::HistoryResponse,
    )),
    tags(
        (name = "names", description = "Name availability"),
        (name = "fees", description = "Fee quotes"),
        (name = "requests", description = "Request lifecycle"),
        (name = "claims", description = "Audit and IP review claims"),
        (name = "registry", description = "Registry finalization and striking"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
