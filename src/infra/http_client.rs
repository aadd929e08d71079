//! HTTP client factory with consistent timeout configuration.
//!
//! Outbound calls to the SSL provisioner go through `try_build_client()` so
//! a slow provisioner can never hold a verification check open.

use reqwest::Client;
use std::time::Duration;

/// Connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request/response time. Provisioner endpoints only acknowledge work,
/// they never issue certificates inline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn try_build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
}
