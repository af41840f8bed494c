//! # Request Extractors
//!
//! Helpers that turn axum rejections into structured [`AppError`]s, so a
//! malformed body or query never produces axum's plain-text default.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use tnr_core::RequestId;

use crate::error::AppError;

/// Shape checks a body can run before it reaches the engine.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Path segment to a request id. Zero is rejected as a validation error.
pub fn request_id(raw: u64) -> Result<RequestId, AppError> {
    Ok(RequestId::new(raw)?)
}
