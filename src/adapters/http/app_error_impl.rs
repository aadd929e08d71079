use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = ?self, "Request failed")
            }
            _ => tracing::warn!(error = %self, "Request rejected"),
        }

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::InvalidHostname(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidHostname, Some(msg))
            }
            AppError::ApexDomainRejected { suggestion } => error_resp_with(
                StatusCode::BAD_REQUEST,
                ErrorCode::ApexDomainRejected,
                json!({ "suggestion": suggestion }),
            ),
            AppError::HostnameCollision {
                conflicting_tenant_name,
            } => error_resp_with(
                StatusCode::CONFLICT,
                ErrorCode::HostnameCollision,
                json!({ "conflicting_tenant_name": conflicting_tenant_name }),
            ),
            AppError::TenantNotFound => {
                error_resp(StatusCode::NOT_FOUND, ErrorCode::TenantNotFound, None)
            }
            AppError::NoChallengeInProgress => {
                error_resp(StatusCode::CONFLICT, ErrorCode::NoChallengeInProgress, None)
            }
            AppError::ChallengeExpired { expired_at } => error_resp_with(
                StatusCode::GONE,
                ErrorCode::ChallengeExpired,
                json!({ "expired_at": expired_at }),
            ),
            AppError::Throttled {
                attempts_remaining,
                next_retry_after,
            } => error_resp_with(
                StatusCode::TOO_MANY_REQUESTS,
                ErrorCode::Throttled,
                json!({
                    "attempts_remaining": attempts_remaining,
                    "next_retry_after": next_retry_after,
                }),
            ),
            AppError::AlreadyVerified => {
                error_resp(StatusCode::CONFLICT, ErrorCode::AlreadyVerified, None)
            }
            AppError::ConcurrentModification => {
                error_resp(StatusCode::CONFLICT, ErrorCode::ConcurrentModification, None)
            }
            AppError::InvalidSignature => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidSignature, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => json!({ "code": code.as_str(), "message": msg }),
        None => json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}

/// Error body carrying machine-readable details next to the code.
fn error_resp_with(status: StatusCode, code: ErrorCode, details: Value) -> Response {
    let mut body = Map::new();
    body.insert("code".into(), Value::from(code.as_str()));
    if let Value::Object(details) = details {
        body.extend(details);
    }
    (status, Json(Value::Object(body))).into_response()
}
