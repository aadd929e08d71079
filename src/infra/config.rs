use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    /// Zone that verification targets live under (e.g., "platform.example").
    pub platform_domain: String,
    /// Where activated hostnames CNAME to once verified (e.g., "ingress.platform.example").
    pub ingress_domain: String,
    /// Subdomain suggested when a tenant tries to bind the apex.
    pub default_subdomain: String,
    /// Optional primary DNS server (e.g., "127.0.0.1:5353" for local CoreDNS).
    /// Falls back to the system resolver.
    pub dns_server: Option<SocketAddr>,
    /// Independent public resolvers used for the propagation check.
    pub consistency_resolvers: Vec<SocketAddr>,
    pub dns_timeout_secs: u64,
    pub verification_poll_secs: u64,
    pub verification_poll_concurrency: usize,
    /// External SSL provisioner. Absent means the reverse proxy issues
    /// certificates on demand.
    pub ssl_provisioner_url: Option<Url>,
    /// Shared secret for signing provisioner requests and verifying callbacks.
    pub ssl_callback_secret: Option<SecretString>,
}

fn parse_resolver_list(raw: &str) -> Vec<SocketAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                tracing::warn!(resolver = %s, "Ignoring unparseable resolver address");
                None
            }
        })
        .collect()
}

fn parse_dns_server(raw: Option<&str>) -> Option<SocketAddr> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            tracing::warn!(
                dns_server = %raw,
                "Ignoring unparseable DNS_SERVER, using the system resolver"
            );
            None
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 3001)),
        );
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let platform_domain: String =
            get_env_default("PLATFORM_DOMAIN", "platform.example".to_string());
        let ingress_domain: String =
            get_env_default("INGRESS_DOMAIN", "ingress.platform.example".to_string());
        let default_subdomain: String =
            get_env_default("DEFAULT_SUBDOMAIN", "booking".to_string());

        let dns_server = parse_dns_server(std::env::var("DNS_SERVER").ok().as_deref());
        let consistency_resolvers = parse_resolver_list(&get_env_default(
            "CONSISTENCY_RESOLVERS",
            "1.1.1.1:53,8.8.8.8:53".to_string(),
        ));
        let dns_timeout_secs: u64 = get_env_default("DNS_TIMEOUT_SECS", 3);

        let verification_poll_secs: u64 = get_env_default("VERIFICATION_POLL_SECS", 30);
        let verification_poll_concurrency: usize =
            get_env_default("VERIFICATION_POLL_CONCURRENCY", 10);

        let ssl_provisioner_url: Option<Url> = std::env::var("SSL_PROVISIONER_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().expect("SSL_PROVISIONER_URL must be a valid URL"));
        let ssl_callback_secret: Option<SecretString> = std::env::var("SSL_CALLBACK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into()));

        Self {
            database_url,
            bind_addr,
            cors_origin,
            platform_domain,
            ingress_domain,
            default_subdomain,
            dns_server,
            consistency_resolvers,
            dns_timeout_secs,
            verification_poll_secs,
            verification_poll_concurrency,
            ssl_provisioner_url,
            ssl_callback_secret,
        }
    }
}
