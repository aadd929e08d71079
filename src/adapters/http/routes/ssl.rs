use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::{
    adapters::{http::app_state::AppState, ssl::SIGNATURE_HEADER},
    app_error::{AppError, AppResult},
    domain::entities::domain_record::SslStatus,
    infra::signature::verify_signature,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(ssl_callback))
}

#[derive(Deserialize)]
struct SslCallbackPayload {
    hostname: String,
    ssl_status: String,
}

fn reported_status(raw: &str) -> AppResult<SslStatus> {
    match raw {
        "provisioning" | "provisioned" | "active" | "failed" => Ok(SslStatus::from_str(raw)),
        other => Err(AppError::InvalidInput(format!(
            "unsupported ssl_status '{other}'"
        ))),
    }
}

/// Status report from the SSL provisioner. The raw body is verified against
/// the HMAC header before it is parsed.
async fn ssl_callback(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let secret = app_state
        .config
        .ssl_callback_secret
        .as_ref()
        .ok_or(AppError::InvalidSignature)?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    if !verify_signature(
        secret.expose_secret(),
        signature,
        &body,
        Utc::now().timestamp(),
    ) {
        return Err(AppError::InvalidSignature);
    }

    let payload: SslCallbackPayload = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("invalid callback body: {e}")))?;
    let ssl_status = reported_status(&payload.ssl_status)?;

    app_state
        .activation_use_cases
        .report_ssl_status(&payload.hostname, ssl_status)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::domain::entities::domain_record::DomainStatus;
    use crate::infra::signature::sign_payload;
    use crate::test_utils::{TEST_CALLBACK_SECRET, TestEngine, create_test_record};

    fn server(engine: &TestEngine) -> TestServer {
        TestServer::new(router().with_state(engine.app_state())).unwrap()
    }

    fn signature_name() -> HeaderName {
        HeaderName::from_static("x-signature")
    }

    fn signed(body: &str) -> HeaderValue {
        signature_value(TEST_CALLBACK_SECRET, body)
    }

    fn signature_value(secret: &str, body: &str) -> HeaderValue {
        HeaderValue::from_str(&sign_payload(secret, Utc::now().timestamp(), body)).unwrap()
    }

    fn verified_engine() -> (TestEngine, uuid::Uuid) {
        let engine = TestEngine::new();
        let tenant = engine.add_tenant("Acme");
        engine.records.seed(create_test_record(|r| {
            r.tenant_id = tenant;
            r.domain_status = DomainStatus::Verified;
            r.ssl_status = SslStatus::Provisioning;
        }));
        (engine, tenant)
    }

    #[tokio::test]
    async fn signed_active_report_activates_domain() {
        let (engine, tenant) = verified_engine();
        let body = json!({ "hostname": "booking.example.com", "ssl_status": "active" }).to_string();

        let response = server(&engine)
            .post("/callback")
            .add_header(signature_name(), signed(&body))
            .text(body)
            .await;

        response.assert_status(StatusCode::NO_CONTENT);
        let stored = engine.records.get(tenant).unwrap();
        assert_eq!(stored.ssl_status, SslStatus::Active);
        assert!(stored.activated_at.is_some());
    }

    #[tokio::test]
    async fn failed_report_fails_domain() {
        let (engine, tenant) = verified_engine();
        let body = json!({ "hostname": "booking.example.com", "ssl_status": "failed" }).to_string();

        server(&engine)
            .post("/callback")
            .add_header(signature_name(), signed(&body))
            .text(body)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let stored = engine.records.get(tenant).unwrap();
        assert_eq!(stored.domain_status, DomainStatus::Failed);
        assert_eq!(stored.ssl_status, SslStatus::Failed);
    }

    #[tokio::test]
    async fn bad_signature_returns_401() {
        let (engine, tenant) = verified_engine();
        let body = json!({ "hostname": "booking.example.com", "ssl_status": "active" }).to_string();

        let response = server(&engine)
            .post("/callback")
            .add_header(signature_name(), signature_value("wrong", &body))
            .text(body)
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["code"], "INVALID_SIGNATURE");
        assert_eq!(
            engine.records.get(tenant).unwrap().ssl_status,
            SslStatus::Provisioning
        );
    }

    #[tokio::test]
    async fn missing_signature_returns_401() {
        let (engine, _) = verified_engine();

        let response = server(&engine)
            .post("/callback")
            .text(json!({ "hostname": "booking.example.com", "ssl_status": "active" }).to_string())
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_hostname_returns_404() {
        let (engine, _) = verified_engine();
        let body = json!({ "hostname": "other.example.com", "ssl_status": "active" }).to_string();

        server(&engine)
            .post("/callback")
            .add_header(signature_name(), signed(&body))
            .text(body)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn pending_is_not_reportable() {
        assert!(reported_status("pending").is_err());
        assert_eq!(reported_status("active").unwrap(), SslStatus::Active);
    }
}
