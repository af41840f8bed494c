//! # Name Check API
//!
//! `GET /v1/names/check?name=&exclude_id=`: whether a proposed trade name
//! is available, and which existing requests block it.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tnr_core::RequestId;
use tnr_state::{CollisionReport, NameMatch};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckNameQuery {
    /// Proposed name.
    pub name: String,
    /// Request to ignore, e.g. the caller's own request when renaming.
    pub exclude_id: Option<u64>,
}

/// Availability of a proposed name.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NameCheckResponse {
    pub name: String,
    /// Canonical key used for comparison.
    pub key: String,
    pub available: bool,
    pub match_count: usize,
    /// Blocking requests, ordered by id.
    #[schema(value_type = Vec<Object>)]
    pub matches: Vec<NameMatch>,
}

impl From<CollisionReport> for NameCheckResponse {
    fn from(report: CollisionReport) -> Self {
        Self {
            name: report.name,
            key: report.key,
            available: report.available,
            match_count: report.match_count,
            matches: report.matches,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/names/check", get(check_name))
}

/// GET /v1/names/check
#[utoipa::path(
    get,
    path = "/v1/names/check",
    params(CheckNameQuery),
    responses(
        (status = 200, description = "Availability report", body = NameCheckResponse),
        (status = 422, description = "Empty or overlong name", body = crate::error::ErrorBody),
    ),
    tag = "names"
)]
pub(crate) async fn check_name(
    State(state): State<AppState>,
    _caller: Caller,
    query: Result<Query<CheckNameQuery>, QueryRejection>,
) -> Result<Json<NameCheckResponse>, AppError> {
    let query = extract_query(query)?;
    let exclude = query.exclude_id.map(RequestId::new).transpose()?;
    let report = state
        .requests
        .read_with(|requests| state.engine.check_name(requests, &query.name, exclude))?;
    Ok(Json(report.into()))
}
