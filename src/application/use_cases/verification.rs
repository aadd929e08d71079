use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        audit_trail::AuditTrail,
        challenge::ChallengeIssuer,
        dns_probe::{DnsProbe, Propagation, PropagationReport, ProbeReport},
        hostname::{normalize_hostname, validate_hostname_parts},
        ports::ssl_provisioner::SslProvisioner,
    },
    domain::entities::{
        audit::{
            AttemptOutcome, ConflictingRecord, DnsRecordType, DomainConflict,
            VERIFICATION_METHOD_CNAME, VerificationAttempt,
        },
        domain_record::{
            CHECK_COOLDOWN_MINS, DomainRecord, DomainStatus, ProbeVerdict, RateLimitDecision,
            SslStatus, TTL_RECOMMENDATION_SECS, VerificationPhase,
        },
    },
};

#[async_trait]
pub trait DomainRecordRepo: Send + Sync {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<DomainRecord>>;
    async fn get_by_hostname(&self, hostname: &str) -> AppResult<Option<DomainRecord>>;
    /// Fails with `HostnameCollision` if the hostname is already bound.
    async fn insert(&self, record: &DomainRecord) -> AppResult<DomainRecord>;
    /// Writes only if the stored version still equals `record.version`,
    /// otherwise `ConcurrentModification`. Returns the row with its new version.
    async fn update(&self, record: &DomainRecord) -> AppResult<DomainRecord>;
    async fn delete(&self, tenant_id: Uuid) -> AppResult<()>;
    /// Pending or conflicted records with attempts left, never checked or last
    /// checked before the cutoff.
    async fn list_due_for_check(
        &self,
        checked_before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<DomainRecord>>;
    /// Verified records whose certificate is not live yet.
    async fn list_awaiting_activation(&self, limit: i64) -> AppResult<Vec<DomainRecord>>;
}

/// Read-only view of the external tenant directory.
#[async_trait]
pub trait TenantRepo: Send + Sync {
    async fn get_by_id(&self, tenant_id: Uuid) -> AppResult<Option<TenantSummary>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedChallenge {
    pub hostname: String,
    pub verification_target: String,
    pub cname_source: String,
    pub cname_target: String,
    pub expires_at: NaiveDateTime,
    pub ttl_recommendation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationStatus {
    pub domain: Option<String>,
    pub subdomain: Option<String>,
    pub status: VerificationPhase,
    pub domain_status: Option<DomainStatus>,
    pub ssl_status: Option<SslStatus>,
    pub dns_propagation: Option<Propagation>,
    pub verification_attempts: i32,
    pub attempts_remaining: i32,
    pub next_check_at: Option<NaiveDateTime>,
    pub verification_target: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedDomain {
    pub hostname: String,
    pub domain_status: DomainStatus,
    pub ssl_status: SslStatus,
    pub verified_at: Option<NaiveDateTime>,
}

/// Actionable diagnostics for a probe that did not verify.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationFailure {
    pub hostname: String,
    pub domain_status: DomainStatus,
    pub found: bool,
    pub expected_record: ExpectedRecord,
    pub actual_targets: Vec<String>,
    pub conflicts: Vec<ConflictingRecord>,
    pub dns_propagation: PropagationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_error: Option<String>,
    pub troubleshooting: Vec<String>,
    pub attempts: i32,
    pub attempts_remaining: i32,
    pub next_check_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedRecord {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

/// Who asked for a check. Only tenant retries spend the attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    Tenant,
    Poller,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Verified(VerifiedDomain),
    Failed(VerificationFailure),
}

#[derive(Clone)]
pub struct VerificationUseCases {
    records: Arc<dyn DomainRecordRepo>,
    tenants: Arc<dyn TenantRepo>,
    audit: AuditTrail,
    dns_probe: DnsProbe,
    issuer: ChallengeIssuer,
    ssl_provisioner: Arc<dyn SslProvisioner>,
    default_subdomain: String,
}

impl VerificationUseCases {
    pub fn new(
        records: Arc<dyn DomainRecordRepo>,
        tenants: Arc<dyn TenantRepo>,
        audit: AuditTrail,
        dns_probe: DnsProbe,
        issuer: ChallengeIssuer,
        ssl_provisioner: Arc<dyn SslProvisioner>,
        default_subdomain: String,
    ) -> Self {
        Self {
            records,
            tenants,
            audit,
            dns_probe,
            issuer,
            ssl_provisioner,
            default_subdomain,
        }
    }

    /// Validate the hostname, issue a challenge and persist a pending record.
    /// Re-initiating overwrites any previous challenge for the tenant.
    #[instrument(skip(self))]
    pub async fn initiate(
        &self,
        tenant_id: Uuid,
        apex_domain: &str,
        subdomain: Option<&str>,
    ) -> AppResult<InitiatedChallenge> {
        self.require_tenant(tenant_id).await?;

        let subdomain = subdomain.unwrap_or(self.default_subdomain.as_str());
        let validated = validate_hostname_parts(apex_domain, subdomain, &self.default_subdomain)?;
        self.ensure_unclaimed(&validated.hostname, tenant_id).await?;

        let now = Utc::now().naive_utc();
        let challenge = self.issuer.issue(now);

        let record = match self.records.get_by_tenant(tenant_id).await? {
            Some(existing) if existing.domain_status == DomainStatus::Verified => {
                return Err(AppError::AlreadyVerified);
            }
            Some(existing) => {
                if existing.domain_status.accepts_probe() && !existing.is_token_expired(now) {
                    warn!(
                        tenant_id = %tenant_id,
                        previous_hostname = %existing.hostname,
                        "Overwriting an unexpired challenge"
                    );
                }
                let next = existing.reissued(
                    &validated.hostname,
                    &validated.apex_domain,
                    &validated.subdomain,
                    challenge,
                );
                self.records.update(&next).await?
            }
            None => {
                let record = DomainRecord::new_pending(
                    tenant_id,
                    &validated.hostname,
                    &validated.apex_domain,
                    &validated.subdomain,
                    challenge,
                );
                self.records.insert(&record).await?
            }
        };

        info!(
            tenant_id = %tenant_id,
            hostname = %record.hostname,
            expires_at = %record.token_expires_at,
            "Verification challenge issued"
        );

        Ok(InitiatedChallenge {
            hostname: record.hostname.clone(),
            verification_target: record.verification_target.clone(),
            cname_source: record.hostname,
            cname_target: record.verification_target,
            expires_at: record.token_expires_at,
            ttl_recommendation: TTL_RECOMMENDATION_SECS,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_status(&self, tenant_id: Uuid) -> AppResult<VerificationStatus> {
        self.require_tenant(tenant_id).await?;
        let now = Utc::now().naive_utc();

        let Some(record) = self.records.get_by_tenant(tenant_id).await? else {
            return Ok(VerificationStatus {
                domain: None,
                subdomain: None,
                status: VerificationPhase::NotStarted,
                domain_status: None,
                ssl_status: None,
                dns_propagation: None,
                verification_attempts: 0,
                attempts_remaining: 0,
                next_check_at: None,
                verification_target: None,
                expires_at: None,
            });
        };

        let dns_propagation = if record.last_check_at.is_some() {
            self.audit.latest_propagation(tenant_id).await
        } else {
            None
        };

        Ok(VerificationStatus {
            domain: Some(record.hostname.clone()),
            subdomain: Some(record.subdomain.clone()),
            status: record.phase(now),
            domain_status: Some(record.effective_status(now)),
            ssl_status: Some(record.ssl_status),
            dns_propagation,
            verification_attempts: record.attempts,
            attempts_remaining: record.attempts_remaining(),
            next_check_at: record.next_check_at(),
            verification_target: Some(record.verification_target),
            expires_at: Some(record.token_expires_at),
        })
    }

    /// Probe DNS now for the tenant's pending challenge.
    #[instrument(skip(self))]
    pub async fn retry(&self, tenant_id: Uuid) -> AppResult<RetryOutcome> {
        self.require_tenant(tenant_id).await?;
        let record = self
            .records
            .get_by_tenant(tenant_id)
            .await?
            .ok_or(AppError::NoChallengeInProgress)?;
        self.check_record(record, Utc::now().naive_utc(), CheckTrigger::Tenant)
            .await
    }

    /// Run one verification check against a loaded record. Shared by `retry`
    /// and the background poller.
    pub async fn check_record(
        &self,
        record: DomainRecord,
        now: NaiveDateTime,
        trigger: CheckTrigger,
    ) -> AppResult<RetryOutcome> {
        match record.domain_status {
            DomainStatus::Verified => return Ok(RetryOutcome::Verified(verified_view(&record))),
            DomainStatus::Failed => return Err(AppError::NoChallengeInProgress),
            DomainStatus::Expired => {
                return Err(AppError::ChallengeExpired {
                    expired_at: record.token_expires_at,
                });
            }
            DomainStatus::Pending | DomainStatus::Conflicted => {}
        }

        if record.is_token_expired(now) {
            let expired_at = record.token_expires_at;
            match self.records.update(&record.expired(now)).await {
                Ok(_) | Err(AppError::ConcurrentModification) => {}
                Err(e) => return Err(e),
            }
            info!(
                tenant_id = %record.tenant_id,
                hostname = %record.hostname,
                "Verification challenge expired"
            );
            return Err(AppError::ChallengeExpired { expired_at });
        }

        let counts_attempt = trigger == CheckTrigger::Tenant;
        let record = match record.check_rate_limit(now) {
            RateLimitDecision::Throttled { retry_after } => {
                return Err(AppError::Throttled {
                    attempts_remaining: 0,
                    next_retry_after: retry_after,
                });
            }
            RateLimitDecision::Proceed { reset: true } if counts_attempt => {
                record.with_attempts_reset()
            }
            // An exhausted budget is only reset by the tenant's own retry.
            RateLimitDecision::Proceed { reset: true } => {
                return Err(AppError::Throttled {
                    attempts_remaining: 0,
                    next_retry_after: now,
                });
            }
            RateLimitDecision::Proceed { reset: false } => record,
        };

        let report = self
            .dns_probe
            .probe(&record.hostname, &record.verification_target)
            .await;

        let outcome = if report.cname.found {
            AttemptOutcome::Verified
        } else if report.conflicts.has_conflicts {
            AttemptOutcome::Conflicted
        } else {
            AttemptOutcome::Failed
        };

        let verdict = match outcome {
            AttemptOutcome::Verified => ProbeVerdict::Verified {
                ssl_status: self.request_certificate(&record.hostname).await,
            },
            AttemptOutcome::Conflicted => ProbeVerdict::Conflicted,
            AttemptOutcome::Failed => ProbeVerdict::NotFound,
        };

        // Losing the version race aborts here, before anything is audited.
        let saved = self
            .records
            .update(&record.after_probe(verdict, now, counts_attempt))
            .await?;

        self.audit_probe(&saved, outcome, &report, now).await;

        match outcome {
            AttemptOutcome::Verified => {
                info!(tenant_id = %saved.tenant_id, hostname = %saved.hostname, "Domain verified");
                Ok(RetryOutcome::Verified(verified_view(&saved)))
            }
            _ => Ok(RetryOutcome::Failed(failure_view(&saved, report))),
        }
    }

    /// Records the poller should probe now.
    pub async fn due_for_check(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<DomainRecord>> {
        let cutoff = now - Duration::minutes(CHECK_COOLDOWN_MINS);
        self.records.list_due_for_check(cutoff, limit).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, tenant_id: Uuid) -> AppResult<()> {
        self.require_tenant(tenant_id).await?;
        self.records
            .get_by_tenant(tenant_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.records.delete(tenant_id).await?;
        info!(tenant_id = %tenant_id, "Domain binding removed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_attempts(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<VerificationAttempt>> {
        self.require_tenant(tenant_id).await?;
        self.audit.attempts_for(tenant_id, limit).await
    }

    /// Whether the reverse proxy may request a certificate for this hostname.
    #[instrument(skip(self))]
    pub async fn is_hostname_allowed(&self, hostname: &str) -> AppResult<bool> {
        let hostname = normalize_hostname(hostname);
        match self.records.get_by_hostname(&hostname).await? {
            Some(r) => Ok(r.domain_status == DomainStatus::Verified),
            None => Ok(false),
        }
    }

    /// Returns the claiming tenant's id if another tenant holds `hostname`.
    pub async fn check_collision(
        &self,
        hostname: &str,
        excluding_tenant: Uuid,
    ) -> AppResult<Option<Uuid>> {
        let existing = self.records.get_by_hostname(hostname).await?;
        Ok(existing
            .map(|r| r.tenant_id)
            .filter(|owner| *owner != excluding_tenant))
    }

    async fn ensure_unclaimed(&self, hostname: &str, tenant_id: Uuid) -> AppResult<()> {
        let Some(owner) = self.check_collision(hostname, tenant_id).await? else {
            return Ok(());
        };
        warn!(hostname = %hostname, tenant_id = %tenant_id, "Hostname already claimed");
        let conflicting_tenant_name = self.tenants.get_by_id(owner).await?.map(|t| t.name);
        Err(AppError::HostnameCollision {
            conflicting_tenant_name,
        })
    }

    async fn require_tenant(&self, tenant_id: Uuid) -> AppResult<TenantSummary> {
        self.tenants
            .get_by_id(tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)
    }

    /// Signal the provisioner. A failed signal leaves the record provisioning
    /// so the activation check can ask again.
    async fn request_certificate(&self, hostname: &str) -> SslStatus {
        match self.ssl_provisioner.request_certificate(hostname).await {
            Ok(status @ (SslStatus::Provisioning | SslStatus::Provisioned | SslStatus::Active)) => {
                status
            }
            Ok(other) => {
                warn!(hostname = %hostname, ssl_status = %other.as_str(), "Unexpected provisioner status");
                SslStatus::Provisioning
            }
            Err(e) => {
                warn!(hostname = %hostname, error = %e, "Failed to signal SSL provisioner");
                SslStatus::Provisioning
            }
        }
    }

    async fn audit_probe(
        &self,
        record: &DomainRecord,
        outcome: AttemptOutcome,
        report: &ProbeReport,
        now: NaiveDateTime,
    ) {
        let diagnostic = serde_json::to_value(report).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize probe report");
            serde_json::Value::Null
        });

        let attempt = VerificationAttempt {
            id: Uuid::new_v4(),
            tenant_id: record.tenant_id,
            hostname: record.hostname.clone(),
            verification_target: record.verification_target.clone(),
            method: VERIFICATION_METHOD_CNAME.to_string(),
            outcome,
            diagnostic,
            created_at: now,
        };
        if let Err(e) = self.audit.record_attempt(&attempt).await {
            warn!(tenant_id = %record.tenant_id, error = %e, "Verification attempt not audited");
        }

        if outcome == AttemptOutcome::Conflicted {
            let conflict = DomainConflict {
                id: Uuid::new_v4(),
                tenant_id: record.tenant_id,
                hostname: record.hostname.clone(),
                conflicting_records: report.conflicts.records.clone(),
                created_at: now,
            };
            if let Err(e) = self.audit.record_conflict(&conflict).await {
                warn!(tenant_id = %record.tenant_id, error = %e, "Domain conflict not audited");
            }
        }
    }
}

fn verified_view(record: &DomainRecord) -> VerifiedDomain {
    VerifiedDomain {
        hostname: record.hostname.clone(),
        domain_status: record.domain_status,
        ssl_status: record.ssl_status,
        verified_at: record.verified_at,
    }
}

fn failure_view(record: &DomainRecord, report: ProbeReport) -> VerificationFailure {
    let expected_record = ExpectedRecord {
        record_type: "CNAME",
        name: record.hostname.clone(),
        value: record.verification_target.clone(),
        ttl: TTL_RECOMMENDATION_SECS,
    };
    let troubleshooting = troubleshooting_steps(&record.hostname, &report);

    // A CNAME pointing elsewhere is reported alongside the records that
    // block a CNAME, so `conflicts` lists everything in the way.
    let mut conflicts = Vec::with_capacity(report.conflicts.records.len() + 1);
    if !report.cname.found && !report.cname.actual_targets.is_empty() {
        conflicts.push(ConflictingRecord {
            record_type: DnsRecordType::Cname,
            values: report.cname.actual_targets.clone(),
        });
    }
    conflicts.extend(report.conflicts.records);

    VerificationFailure {
        hostname: record.hostname.clone(),
        domain_status: record.domain_status,
        found: report.cname.found,
        expected_record,
        actual_targets: report.cname.actual_targets,
        conflicts,
        dns_propagation: report.propagation,
        lookup_error: report.cname.error,
        troubleshooting,
        attempts: record.attempts,
        attempts_remaining: record.attempts_remaining(),
        next_check_at: record.next_check_at(),
    }
}

/// Suggested fixes, most specific first.
pub fn troubleshooting_steps(hostname: &str, report: &ProbeReport) -> Vec<String> {
    let mut steps = Vec::new();
    let expected = &report.expected_target;

    if let Some(err) = &report.cname.error {
        steps.push(format!(
            "The DNS lookup for {hostname} failed ({err}). This is usually temporary; check again in a few minutes."
        ));
    } else if report.cname.actual_targets.is_empty() {
        steps.push(format!(
            "No CNAME record found for {hostname}. Add a CNAME record pointing to {expected}."
        ));
    } else {
        steps.push(format!(
            "{hostname} points to {}. Change the CNAME value to {expected}.",
            report.cname.actual_targets.join(", ")
        ));
    }

    for record in &report.conflicts.records {
        steps.push(format!(
            "Remove the {} record(s) at {hostname} ({}). A CNAME cannot coexist with other records at the same name.",
            record.record_type,
            record.values.join(", ")
        ));
    }

    match report.propagation.state {
        Propagation::Propagating => steps.push(
            "Some public resolvers already see the new record. DNS changes can take a while to propagate; check again later."
                .to_string(),
        ),
        Propagation::NotConfigured if report.conflicts.records.is_empty() => steps.push(format!(
            "Public resolvers do not see the record yet. Lower the TTL to {TTL_RECOMMENDATION_SECS} seconds to speed up future changes."
        )),
        _ => {}
    }

    steps
}
