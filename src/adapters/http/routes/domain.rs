use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::{
        dns_probe::Propagation,
        use_cases::{
            activation::DnsInstruction,
            verification::{RetryOutcome, VerificationFailure},
        },
    },
    domain::entities::{
        audit::VerificationAttempt,
        domain_record::{DomainStatus, SslStatus, VerificationPhase},
    },
};

const DEFAULT_ATTEMPTS_LIMIT: i64 = 20;
const MAX_ATTEMPTS_LIMIT: i64 = 100;

/// Routes scoped to one tenant's custom hostname.
pub fn tenant_router() -> Router<AppState> {
    Router::new()
        .route("/{tenant_id}/domain", post(initiate).delete(remove))
        .route("/{tenant_id}/domain/status", get(get_status))
        .route("/{tenant_id}/domain/retry", post(retry))
        .route("/{tenant_id}/domain/attempts", get(list_attempts))
        .route("/{tenant_id}/domain/activation", get(get_activation))
        .route("/{tenant_id}/domain/activation/check", post(check_activation))
}

/// Public routes consumed by the reverse proxy.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/check-allowed", get(check_allowed))
}

#[derive(Deserialize)]
struct InitiatePayload {
    apex_domain: String,
    subdomain: Option<String>,
}

#[derive(Serialize)]
struct InitiateResponse {
    hostname: String,
    verification_target: String,
    cname_source: String,
    cname_target: String,
    expires_at: NaiveDateTime,
    ttl_recommendation: u32,
}

async fn initiate(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<InitiatePayload>,
) -> AppResult<impl IntoResponse> {
    let challenge = app_state
        .verification_use_cases
        .initiate(
            tenant_id,
            &payload.apex_domain,
            payload.subdomain.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiateResponse {
            hostname: challenge.hostname,
            verification_target: challenge.verification_target,
            cname_source: challenge.cname_source,
            cname_target: challenge.cname_target,
            expires_at: challenge.expires_at,
            ttl_recommendation: challenge.ttl_recommendation,
        }),
    ))
}

#[derive(Serialize)]
struct StatusResponse {
    domain: Option<String>,
    subdomain: Option<String>,
    status: VerificationPhase,
    domain_status: Option<DomainStatus>,
    ssl_status: Option<SslStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dns_propagation: Option<Propagation>,
    verification_attempts: i32,
    attempts_remaining: i32,
    next_check_at: Option<NaiveDateTime>,
    verification_target: Option<String>,
    expires_at: Option<NaiveDateTime>,
}

async fn get_status(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let status = app_state.verification_use_cases.get_status(tenant_id).await?;

    Ok(Json(StatusResponse {
        domain: status.domain,
        subdomain: status.subdomain,
        status: status.status,
        domain_status: status.domain_status,
        ssl_status: status.ssl_status,
        dns_propagation: status.dns_propagation,
        verification_attempts: status.verification_attempts,
        attempts_remaining: status.attempts_remaining,
        next_check_at: status.next_check_at,
        verification_target: status.verification_target,
        expires_at: status.expires_at,
    }))
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RetryResponse {
    Verified {
        hostname: String,
        domain_status: DomainStatus,
        ssl_status: SslStatus,
        verified_at: Option<NaiveDateTime>,
    },
    VerificationFailed(VerificationFailure),
}

async fn retry(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let response = match app_state.verification_use_cases.retry(tenant_id).await? {
        RetryOutcome::Verified(domain) => RetryResponse::Verified {
            hostname: domain.hostname,
            domain_status: domain.domain_status,
            ssl_status: domain.ssl_status,
            verified_at: domain.verified_at,
        },
        RetryOutcome::Failed(failure) => RetryResponse::VerificationFailed(failure),
    };
    Ok(Json(response))
}

async fn remove(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    app_state.verification_use_cases.remove(tenant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AttemptsQuery {
    limit: Option<i64>,
}

async fn list_attempts(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<AttemptsQuery>,
) -> AppResult<Json<Vec<VerificationAttempt>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ATTEMPTS_LIMIT)
        .clamp(1, MAX_ATTEMPTS_LIMIT);
    let attempts = app_state
        .verification_use_cases
        .list_attempts(tenant_id, limit)
        .await?;
    Ok(Json(attempts))
}

#[derive(Serialize)]
struct ActivationResponse {
    hostname: String,
    status: VerificationPhase,
    domain_status: DomainStatus,
    ssl_status: SslStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<DnsInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_url: Option<String>,
}

async fn get_activation(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let status = app_state.activation_use_cases.get_status(tenant_id).await?;
    Ok(Json(ActivationResponse {
        hostname: status.hostname,
        status: status.status,
        domain_status: status.domain_status,
        ssl_status: status.ssl_status,
        message: status.message,
        instructions: status.instructions,
        test_url: status.test_url,
    }))
}

#[derive(Serialize)]
struct ActivationCheckResponse {
    activated: bool,
    ssl_status: SslStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_url: Option<String>,
}

async fn check_activation(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let check = app_state
        .activation_use_cases
        .check_activation(tenant_id)
        .await?;
    Ok(Json(ActivationCheckResponse {
        activated: check.activated,
        ssl_status: check.ssl_status,
        test_url: check.test_url,
    }))
}

#[derive(Deserialize)]
struct CheckAllowedParams {
    domain: String,
}

/// 200 lets the reverse proxy request a certificate, anything else refuses.
async fn check_allowed(
    State(app_state): State<AppState>,
    Query(params): Query<CheckAllowedParams>,
) -> impl IntoResponse {
    let allowed = app_state
        .verification_use_cases
        .is_hostname_allowed(&params.domain)
        .await;
    allowed_status(&params.domain, allowed)
}

/// Fails closed: a lookup error refuses the certificate like an unknown host.
fn allowed_status(hostname: &str, allowed: AppResult<bool>) -> StatusCode {
    match allowed {
        Ok(true) => StatusCode::OK,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!(hostname = %hostname, error = %e, "Certificate gate lookup failed");
            StatusCode::NOT_FOUND
        }
    }
}
