//! Wiring of use cases and `AppState` over in-memory mocks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        audit_trail::AuditTrail,
        challenge::ChallengeIssuer,
        dns_probe::DnsProbe,
        ports::dns_resolver::DnsResolver,
    },
    infra::config::AppConfig,
    test_utils::{
        InMemoryAuditRepo, InMemoryDomainRecordRepo, InMemoryTenantRepo, MockDnsResolver,
        RecordingSslProvisioner, TEST_INGRESS_DOMAIN, TEST_PLATFORM_DOMAIN,
    },
    use_cases::{activation::ActivationUseCases, verification::VerificationUseCases},
};

pub const TEST_CALLBACK_SECRET: &str = "test_callback_secret";

/// Shared mocks plus factories for use cases built on top of them. Every use
/// case built from one engine sees the same store, DNS and provisioner.
pub struct TestEngine {
    pub records: Arc<InMemoryDomainRecordRepo>,
    pub tenants: Arc<InMemoryTenantRepo>,
    pub audit: Arc<InMemoryAuditRepo>,
    pub dns: Arc<MockDnsResolver>,
    pub consistency: Vec<Arc<MockDnsResolver>>,
    pub ssl: Arc<RecordingSslProvisioner>,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine {
    pub fn new() -> Self {
        Self {
            records: Arc::new(InMemoryDomainRecordRepo::new()),
            tenants: Arc::new(InMemoryTenantRepo::new()),
            audit: Arc::new(InMemoryAuditRepo::new()),
            dns: Arc::new(MockDnsResolver::named("primary")),
            consistency: vec![],
            ssl: Arc::new(RecordingSslProvisioner::new()),
        }
    }

    pub fn with_consistency_resolvers(mut self, resolvers: Vec<MockDnsResolver>) -> Self {
        self.consistency = resolvers.into_iter().map(Arc::new).collect();
        self
    }

    pub fn add_tenant(&self, name: &str) -> Uuid {
        self.tenants.add(name)
    }

    pub fn verification(&self) -> VerificationUseCases {
        let consistency = self
            .consistency
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn DnsResolver>)
            .collect();
        VerificationUseCases::new(
            self.records.clone(),
            self.tenants.clone(),
            AuditTrail::new(self.audit.clone()),
            DnsProbe::new(self.dns.clone(), consistency, Duration::from_millis(200)),
            ChallengeIssuer::new(TEST_PLATFORM_DOMAIN),
            self.ssl.clone(),
            "booking".to_string(),
        )
    }

    pub fn activation(&self) -> ActivationUseCases {
        ActivationUseCases::new(
            self.records.clone(),
            self.tenants.clone(),
            self.ssl.clone(),
            TEST_INGRESS_DOMAIN.to_string(),
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: Arc::new(test_config()),
            verification_use_cases: Arc::new(self.verification()),
            activation_use_cases: Arc::new(self.activation()),
        }
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/test".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        platform_domain: TEST_PLATFORM_DOMAIN.to_string(),
        ingress_domain: TEST_INGRESS_DOMAIN.to_string(),
        default_subdomain: "booking".to_string(),
        dns_server: None,
        consistency_resolvers: vec![],
        dns_timeout_secs: 1,
        verification_poll_secs: 30,
        verification_poll_concurrency: 4,
        ssl_provisioner_url: None,
        ssl_callback_secret: Some(SecretString::new(TEST_CALLBACK_SECRET.into())),
    }
}
