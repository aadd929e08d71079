use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{
        dns::HickoryDnsResolver,
        http::app_state::AppState,
        ssl::{OnDemandTlsProvisioner, WebhookSslProvisioner},
    },
    application::{
        audit_trail::{AuditRepo, AuditTrail},
        challenge::ChallengeIssuer,
        dns_probe::DnsProbe,
        ports::{dns_resolver::DnsResolver, ssl_provisioner::SslProvisioner},
    },
    infra::{config::AppConfig, error::InfraError, postgres_persistence},
    use_cases::{
        activation::ActivationUseCases,
        verification::{DomainRecordRepo, TenantRepo, VerificationUseCases},
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let record_repo = postgres_arc.clone() as Arc<dyn DomainRecordRepo>;
    let tenant_repo = postgres_arc.clone() as Arc<dyn TenantRepo>;
    let audit_repo = postgres_arc.clone() as Arc<dyn AuditRepo>;

    let dns_probe = build_dns_probe(&config)?;
    let ssl_provisioner = build_ssl_provisioner(&config)?;

    let verification_use_cases = VerificationUseCases::new(
        record_repo.clone(),
        tenant_repo.clone(),
        AuditTrail::new(audit_repo),
        dns_probe,
        ChallengeIssuer::new(config.platform_domain.clone()),
        ssl_provisioner.clone(),
        config.default_subdomain.clone(),
    );

    let activation_use_cases = ActivationUseCases::new(
        record_repo,
        tenant_repo,
        ssl_provisioner,
        config.ingress_domain.clone(),
    );

    Ok(AppState {
        config: Arc::new(config),
        verification_use_cases: Arc::new(verification_use_cases),
        activation_use_cases: Arc::new(activation_use_cases),
    })
}

fn build_dns_probe(config: &AppConfig) -> Result<DnsProbe, InfraError> {
    let timeout = Duration::from_secs(config.dns_timeout_secs);

    let primary: Arc<dyn DnsResolver> = match config.dns_server {
        Some(addr) => Arc::new(HickoryDnsResolver::with_nameserver(addr, timeout)),
        None => Arc::new(HickoryDnsResolver::system(timeout).map_err(InfraError::ResolverInit)?),
    };

    let consistency_resolvers = config
        .consistency_resolvers
        .iter()
        .map(|addr| {
            Arc::new(HickoryDnsResolver::with_nameserver(*addr, timeout)) as Arc<dyn DnsResolver>
        })
        .collect();

    Ok(DnsProbe::new(primary, consistency_resolvers, timeout))
}

fn build_ssl_provisioner(config: &AppConfig) -> Result<Arc<dyn SslProvisioner>, InfraError> {
    let Some(url) = config.ssl_provisioner_url.clone() else {
        tracing::info!("No SSL provisioner configured, using on-demand TLS");
        return Ok(Arc::new(OnDemandTlsProvisioner));
    };
    let secret = config
        .ssl_callback_secret
        .clone()
        .ok_or(InfraError::ConfigMissing {
            var: "SSL_CALLBACK_SECRET",
        })?;
    let provisioner =
        WebhookSslProvisioner::new(url, secret).map_err(InfraError::ProvisionerInit)?;
    Ok(Arc::new(provisioner))
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "custom_domain_api=debug,tower_http=debug".into());

    let console_layer = fmt::layer().with_target(false).with_level(true);

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);

    // JSON logs for collectors, pretty console logs for local runs.
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(json_layer).try_init().ok();
    } else {
        registry.with(console_layer.pretty()).try_init().ok();
    }
}
