use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        hostname::normalize_hostname,
        ports::ssl_provisioner::SslProvisioner,
        use_cases::verification::{DomainRecordRepo, TenantRepo},
    },
    domain::entities::domain_record::{
        DomainRecord, DomainStatus, SslStatus, TTL_RECOMMENDATION_SECS, VerificationPhase,
    },
};

/// CAS retries for provisioner callbacks racing with other writers.
const CALLBACK_WRITE_TRIES: usize = 3;

/// A DNS record the tenant is asked to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsInstruction {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationStatus {
    pub hostname: String,
    pub status: VerificationPhase,
    pub domain_status: DomainStatus,
    pub ssl_status: SslStatus,
    pub message: String,
    pub instructions: Option<DnsInstruction>,
    pub test_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationCheck {
    pub activated: bool,
    pub ssl_status: SslStatus,
    pub test_url: Option<String>,
}

#[derive(Clone)]
pub struct ActivationUseCases {
    records: Arc<dyn DomainRecordRepo>,
    tenants: Arc<dyn TenantRepo>,
    ssl_provisioner: Arc<dyn SslProvisioner>,
    ingress_domain: String,
}

impl ActivationUseCases {
    pub fn new(
        records: Arc<dyn DomainRecordRepo>,
        tenants: Arc<dyn TenantRepo>,
        ssl_provisioner: Arc<dyn SslProvisioner>,
        ingress_domain: String,
    ) -> Self {
        Self {
            records,
            tenants,
            ssl_provisioner,
            ingress_domain,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_status(&self, tenant_id: Uuid) -> AppResult<ActivationStatus> {
        let record = self.load(tenant_id).await?;
        Ok(self.describe(&record, Utc::now().naive_utc()))
    }

    /// Idempotent: flips a verified record to active once the certificate is
    /// ready, otherwise just reports where provisioning stands.
    #[instrument(skip(self))]
    pub async fn check_activation(&self, tenant_id: Uuid) -> AppResult<ActivationCheck> {
        let record = self.load(tenant_id).await?;
        self.try_activate(record, Utc::now().naive_utc()).await
    }

    pub async fn try_activate(
        &self,
        record: DomainRecord,
        now: NaiveDateTime,
    ) -> AppResult<ActivationCheck> {
        if record.domain_status != DomainStatus::Verified {
            return Ok(not_activated(&record));
        }
        if record.ssl_status == SslStatus::Active {
            return Ok(activated(&record));
        }

        let ready = record.ssl_status.is_ready() || self.poll_provisioner(&record, now).await?;
        if !ready {
            let current = self
                .records
                .get_by_tenant(record.tenant_id)
                .await?
                .unwrap_or(record);
            return Ok(not_activated(&current));
        }

        match self.records.update(&record.activated(now)).await {
            Ok(saved) => {
                info!(tenant_id = %saved.tenant_id, hostname = %saved.hostname, "Domain activated");
                Ok(activated(&saved))
            }
            Err(AppError::ConcurrentModification) => {
                // Another caller won the race; report whatever it wrote.
                let current = self
                    .records
                    .get_by_tenant(record.tenant_id)
                    .await?
                    .ok_or(AppError::NoChallengeInProgress)?;
                if current.ssl_status == SslStatus::Active {
                    Ok(activated(&current))
                } else {
                    Err(AppError::ConcurrentModification)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a status report from the SSL provisioner.
    #[instrument(skip(self))]
    pub async fn report_ssl_status(&self, hostname: &str, ssl_status: SslStatus) -> AppResult<()> {
        let hostname = normalize_hostname(hostname);
        for _ in 0..CALLBACK_WRITE_TRIES {
            let record = self
                .records
                .get_by_hostname(&hostname)
                .await?
                .ok_or(AppError::NotFound)?;

            if record.domain_status != DomainStatus::Verified {
                return Err(AppError::InvalidInput(format!(
                    "{hostname} is not verified"
                )));
            }

            // Never move a live certificate backwards. A failed renewal keeps
            // serving the current certificate.
            if record.ssl_status == SslStatus::Active && ssl_status != SslStatus::Active {
                warn!(
                    hostname = %record.hostname,
                    ssl_status = %ssl_status.as_str(),
                    "Ignoring SSL status report for an active domain"
                );
                return Ok(());
            }

            let now = Utc::now().naive_utc();
            let next = match ssl_status {
                SslStatus::Failed => record.ssl_failed(now),
                SslStatus::Active => record.activated(now),
                SslStatus::Provisioned | SslStatus::Provisioning => {
                    record.with_ssl_status(ssl_status, now)
                }
                SslStatus::Pending => {
                    return Err(AppError::InvalidInput(
                        "pending is not a reportable SSL status".into(),
                    ));
                }
            };

            match self.records.update(&next).await {
                Ok(saved) => {
                    info!(
                        hostname = %saved.hostname,
                        ssl_status = %saved.ssl_status.as_str(),
                        "SSL status reported"
                    );
                    return Ok(());
                }
                Err(AppError::ConcurrentModification) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(AppError::ConcurrentModification)
    }

    /// Verified records the poller should run activation checks for.
    pub async fn awaiting_activation(&self, limit: i64) -> AppResult<Vec<DomainRecord>> {
        self.records.list_awaiting_activation(limit).await
    }

    /// Ask the provisioner about a still-provisioning certificate. Returns
    /// whether it is ready; a reported failure fails the record.
    async fn poll_provisioner(&self, record: &DomainRecord, now: NaiveDateTime) -> AppResult<bool> {
        match self.ssl_provisioner.certificate_status(&record.hostname).await {
            Ok(Some(status)) if status.is_ready() => Ok(true),
            Ok(Some(SslStatus::Failed)) => {
                warn!(hostname = %record.hostname, "SSL provisioning failed");
                match self.records.update(&record.ssl_failed(now)).await {
                    Ok(_) | Err(AppError::ConcurrentModification) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            Ok(Some(_)) => Ok(false),
            Ok(None) => {
                // Provisioner never heard of it, most likely a lost signal.
                if let Err(e) = self
                    .ssl_provisioner
                    .request_certificate(&record.hostname)
                    .await
                {
                    warn!(hostname = %record.hostname, error = %e, "Failed to re-signal SSL provisioner");
                }
                Ok(false)
            }
            Err(e) => {
                warn!(hostname = %record.hostname, error = %e, "SSL status poll failed");
                Ok(false)
            }
        }
    }

    fn describe(&self, record: &DomainRecord, now: NaiveDateTime) -> ActivationStatus {
        let phase = record.phase(now);
        let (message, instructions, test_url) = match phase {
            VerificationPhase::Pending | VerificationPhase::Conflicted => (
                "awaiting_dns_verification".to_string(),
                Some(DnsInstruction {
                    record_type: "CNAME",
                    name: record.hostname.clone(),
                    value: record.verification_target.clone(),
                    ttl: TTL_RECOMMENDATION_SECS,
                }),
                None,
            ),
            VerificationPhase::Verified => (
                "ready_for_activation".to_string(),
                Some(DnsInstruction {
                    record_type: "CNAME",
                    name: record.hostname.clone(),
                    value: self.ingress_domain.clone(),
                    ttl: TTL_RECOMMENDATION_SECS,
                }),
                None,
            ),
            VerificationPhase::Active => {
                ("active".to_string(), None, Some(test_url(&record.hostname)))
            }
            VerificationPhase::Expired => ("challenge_expired_reinitiate".to_string(), None, None),
            VerificationPhase::Failed | VerificationPhase::NotStarted => {
                ("verification_failed_reinitiate".to_string(), None, None)
            }
        };

        ActivationStatus {
            hostname: record.hostname.clone(),
            status: phase,
            domain_status: record.effective_status(now),
            ssl_status: record.ssl_status,
            message,
            instructions,
            test_url,
        }
    }

    async fn load(&self, tenant_id: Uuid) -> AppResult<DomainRecord> {
        self.tenants
            .get_by_id(tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)?;
        self.records
            .get_by_tenant(tenant_id)
            .await?
            .ok_or(AppError::NoChallengeInProgress)
    }
}

pub fn test_url(hostname: &str) -> String {
    format!("https://{hostname}")
}

fn activated(record: &DomainRecord) -> ActivationCheck {
    ActivationCheck {
        activated: true,
        ssl_status: SslStatus::Active,
        test_url: Some(test_url(&record.hostname)),
    }
}

fn not_activated(record: &DomainRecord) -> ActivationCheck {
    ActivationCheck {
        activated: false,
        ssl_status: record.ssl_status,
        test_url: None,
    }
}
