//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Workflow errors keep their own machine-readable codes and are mapped to
//! a status by their [`ErrorKind`], so not-found, forbidden, conflict and
//! unavailable responses all come from [`AppError::Workflow`]. Internal
//! error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tnr_state::{ErrorKind, WorkflowError};
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NAME_CONFLICT", "ALREADY_CLAIMED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Structured context, e.g. the conflicting requests of a name conflict.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A rejection from the workflow engine, carrying its own code.
    #[error(transparent)]
    Workflow(WorkflowError),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

fn kind_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Misconfiguration => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Workflow(err) => (kind_status(err.kind()), err.code()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        let Self::Workflow(err) = self else {
            return None;
        };
        match err {
            WorkflowError::NameConflict(report) => serde_json::to_value(report.as_ref()).ok(),
            WorkflowError::AlreadyClaimed { request_id, track, holder } => Some(serde_json::json!({
                "request_id": request_id.get(),
                "track": track.as_str(),
                "holder": holder.get(),
            })),
            WorkflowError::IllegalTransition { from, to, .. } => Some(serde_json::json!({
                "from": from.as_str(),
                "to": to.as_str(),
            })),
            WorkflowError::FeeNotConfigured { province_id } => Some(serde_json::json!({
                "province_id": province_id.get(),
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Workflow(err) => tracing::debug!(code, error = %err, "operation rejected by workflow guard"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<tnr_core::ValidationError> for AppError {
    fn from(err: tnr_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}
