use async_trait::async_trait;

use crate::{app_error::AppResult, domain::entities::domain_record::SslStatus};

/// External certificate issuance and cutover. The engine signals verified
/// hostnames and later asks how far provisioning got.
#[async_trait]
pub trait SslProvisioner: Send + Sync {
    /// Ask for a certificate. Returns the status to record right away.
    async fn request_certificate(&self, hostname: &str) -> AppResult<SslStatus>;

    /// Current status for a previously signalled hostname, if known.
    async fn certificate_status(&self, hostname: &str) -> AppResult<Option<SslStatus>>;
}
