//! # Fee Quote API
//!
//! `GET /v1/fees/:province_id`: the amount a fee-liable submission in the
//! province would be invoiced.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tnr_core::ProvinceId;
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::AppError;
use crate::state::AppState;

/// Fee quote for one province.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeeQuoteResponse {
    pub province_id: u64,
    /// Sum of active fee rules, in the smallest currency unit.
    pub amount: u64,
    /// Whether fee-liable submissions can currently be accepted.
    pub fee_liable_accepted: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/fees/:province_id", get(quote_fee))
}

/// GET /v1/fees/:province_id
#[utoipa::path(
    get,
    path = "/v1/fees/{province_id}",
    params(("province_id" = u64, Path, description = "Province id")),
    responses(
        (status = 200, description = "Fee quote", body = FeeQuoteResponse),
        (status = 422, description = "Invalid province id", body = crate::error::ErrorBody),
        (status = 503, description = "Fee rules unavailable", body = crate::error::ErrorBody),
    ),
    tag = "fees"
)]
pub(crate) async fn quote_fee(
    State(state): State<AppState>,
    _caller: Caller,
    Path(province_id): Path<u64>,
) -> Result<Json<FeeQuoteResponse>, AppError> {
    let province_id = ProvinceId::new(province_id)?;
    let amount = state.engine.quote_fee(province_id)?;
    Ok(Json(FeeQuoteResponse {
        province_id: province_id.get(),
        amount,
        fee_liable_accepted: amount > 0,
    }))
}
