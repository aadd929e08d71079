use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::ssl_provisioner::SslProvisioner,
    domain::entities::domain_record::SslStatus,
    infra::{http_client::try_build_client, signature::sign_payload},
};

pub const SIGNATURE_HEADER: &str = "X-Signature";

/// The reverse proxy issues certificates on the first TLS handshake, gated by
/// `/domains/check-allowed`. Once a hostname is verified there is nothing left
/// to wait for.
#[derive(Default)]
pub struct OnDemandTlsProvisioner;

#[async_trait]
impl SslProvisioner for OnDemandTlsProvisioner {
    async fn request_certificate(&self, hostname: &str) -> AppResult<SslStatus> {
        debug!(hostname = %hostname, "Certificate will be issued on demand");
        Ok(SslStatus::Provisioned)
    }

    async fn certificate_status(&self, _hostname: &str) -> AppResult<Option<SslStatus>> {
        Ok(Some(SslStatus::Provisioned))
    }
}

#[derive(Serialize)]
struct CertificateRequest<'a> {
    hostname: &'a str,
}

#[derive(Deserialize)]
struct CertificateResponse {
    status: String,
}

/// External provisioner reached over HTTP. Requests are signed with the
/// shared secret; status changes come back through `/ssl/callback`.
pub struct WebhookSslProvisioner {
    client: Client,
    base_url: Url,
    secret: SecretString,
}

impl WebhookSslProvisioner {
    pub fn new(base_url: Url, secret: SecretString) -> AppResult<Self> {
        let client = try_build_client()
            .map_err(|e| AppError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            secret,
        })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("provisioner url: {e}")))
    }
}

fn parse_status(body: CertificateResponse) -> AppResult<SslStatus> {
    match body.status.as_str() {
        "pending" | "provisioning" | "provisioned" | "active" | "failed" => {
            Ok(SslStatus::from_str(&body.status))
        }
        other => Err(AppError::Internal(format!(
            "unknown provisioner status '{other}'"
        ))),
    }
}

#[async_trait]
impl SslProvisioner for WebhookSslProvisioner {
    async fn request_certificate(&self, hostname: &str) -> AppResult<SslStatus> {
        let url = self.endpoint("certificates")?;
        let body = serde_json::to_string(&CertificateRequest { hostname })
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let signature = sign_payload(
            self.secret.expose_secret(),
            Utc::now().timestamp(),
            &body,
        );

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("provisioner request: {e}")))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(SslStatus::Provisioning);
        }
        if !status.is_success() {
            warn!(hostname = %hostname, status = %status, "Provisioner rejected certificate request");
            return Err(AppError::Internal(format!("provisioner returned {status}")));
        }

        let body: CertificateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("provisioner response: {e}")))?;
        parse_status(body)
    }

    async fn certificate_status(&self, hostname: &str) -> AppResult<Option<SslStatus>> {
        let url = self.endpoint(&format!("certificates/{hostname}"))?;
        let signature = sign_payload(self.secret.expose_secret(), Utc::now().timestamp(), "");

        let response = self
            .client
            .get(url)
            .header(SIGNATURE_HEADER, signature)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("provisioner request: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::Internal(format!("provisioner returned {status}")));
        }

        let body: CertificateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("provisioner response: {e}")))?;
        parse_status(body).map(Some)
    }
}
