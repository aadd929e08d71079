use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Challenge lifetime, measured from issuance.
pub const TOKEN_TTL_HOURS: i64 = 24;
/// Probes allowed before the throttle window applies.
pub const MAX_ATTEMPTS: i32 = 5;
pub const THROTTLE_WINDOW_MINS: i64 = 60;
/// Advisory spacing between probes, surfaced as `next_check_at`.
pub const CHECK_COOLDOWN_MINS: i64 = 5;
pub const TTL_RECOMMENDATION_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Pending,
    Verified,
    Conflicted,
    Expired,
    Failed,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Pending => "pending",
            DomainStatus::Verified => "verified",
            DomainStatus::Conflicted => "conflicted",
            DomainStatus::Expired => "expired",
            DomainStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => DomainStatus::Pending,
            "verified" => DomainStatus::Verified,
            "conflicted" => DomainStatus::Conflicted,
            "expired" => DomainStatus::Expired,
            "failed" => DomainStatus::Failed,
            _ => DomainStatus::Pending,
        }
    }

    /// States in which a DNS probe may still advance the record.
    pub fn accepts_probe(&self) -> bool {
        matches!(self, DomainStatus::Pending | DomainStatus::Conflicted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SslStatus {
    Pending,
    Provisioning,
    Provisioned,
    Active,
    Failed,
}

impl SslStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslStatus::Pending => "pending",
            SslStatus::Provisioning => "provisioning",
            SslStatus::Provisioned => "provisioned",
            SslStatus::Active => "active",
            SslStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => SslStatus::Pending,
            "provisioning" => SslStatus::Provisioning,
            "provisioned" => SslStatus::Provisioned,
            "active" => SslStatus::Active,
            "failed" => SslStatus::Failed,
            _ => SslStatus::Pending,
        }
    }

    /// Certificate is issued and traffic may be cut over.
    pub fn is_ready(&self) -> bool {
        matches!(self, SslStatus::Provisioned | SslStatus::Active)
    }
}

/// Overall lifecycle position shown to callers. `NotStarted` has no record
/// behind it and `Active` is a verified record whose certificate is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPhase {
    NotStarted,
    Pending,
    Verified,
    Conflicted,
    Expired,
    Failed,
    Active,
}

impl VerificationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPhase::NotStarted => "not_started",
            VerificationPhase::Pending => "pending",
            VerificationPhase::Verified => "verified",
            VerificationPhase::Conflicted => "conflicted",
            VerificationPhase::Expired => "expired",
            VerificationPhase::Failed => "failed",
            VerificationPhase::Active => "active",
        }
    }
}

/// A freshly issued CNAME challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub token: String,
    pub target: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// Result of consulting the throttle before a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Proceed { reset: bool },
    Throttled { retry_after: NaiveDateTime },
}

/// What a probe concluded, ready to be folded into the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    Verified { ssl_status: SslStatus },
    NotFound,
    Conflicted,
}

/// One tenant's hostname binding and its challenge state.
///
/// Transitions are expressed as methods returning the next record so the
/// caller can persist them with a version check.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    pub tenant_id: Uuid,
    pub hostname: String,
    pub apex_domain: String,
    pub subdomain: String,
    pub verification_token: String,
    pub verification_target: String,
    pub token_issued_at: NaiveDateTime,
    pub token_expires_at: NaiveDateTime,
    pub attempts: i32,
    pub last_check_at: Option<NaiveDateTime>,
    pub domain_status: DomainStatus,
    pub ssl_status: SslStatus,
    pub verified_at: Option<NaiveDateTime>,
    pub activated_at: Option<NaiveDateTime>,
    pub version: i64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl DomainRecord {
    pub fn new_pending(
        tenant_id: Uuid,
        hostname: &str,
        apex_domain: &str,
        subdomain: &str,
        challenge: Challenge,
    ) -> Self {
        Self {
            tenant_id,
            hostname: hostname.to_string(),
            apex_domain: apex_domain.to_string(),
            subdomain: subdomain.to_string(),
            verification_token: challenge.token,
            verification_target: challenge.target,
            token_issued_at: challenge.issued_at,
            token_expires_at: challenge.expires_at,
            attempts: 0,
            last_check_at: None,
            domain_status: DomainStatus::Pending,
            ssl_status: SslStatus::Pending,
            verified_at: None,
            activated_at: None,
            version: 0,
            created_at: Some(challenge.issued_at),
            updated_at: Some(challenge.issued_at),
        }
    }

    /// Overwrite the challenge and hostname, invalidating the previous token.
    pub fn reissued(
        &self,
        hostname: &str,
        apex_domain: &str,
        subdomain: &str,
        challenge: Challenge,
    ) -> Self {
        let now = challenge.issued_at;
        Self {
            hostname: hostname.to_string(),
            apex_domain: apex_domain.to_string(),
            subdomain: subdomain.to_string(),
            verification_token: challenge.token,
            verification_target: challenge.target,
            token_issued_at: challenge.issued_at,
            token_expires_at: challenge.expires_at,
            attempts: 0,
            last_check_at: None,
            domain_status: DomainStatus::Pending,
            ssl_status: SslStatus::Pending,
            verified_at: None,
            activated_at: None,
            updated_at: Some(now),
            ..self.clone()
        }
    }

    pub fn is_token_expired(&self, now: NaiveDateTime) -> bool {
        now > self.token_expires_at
    }

    /// Status with expiry applied lazily; the stored row may still say pending.
    pub fn effective_status(&self, now: NaiveDateTime) -> DomainStatus {
        if self.domain_status.accepts_probe() && self.is_token_expired(now) {
            DomainStatus::Expired
        } else {
            self.domain_status
        }
    }

    pub fn phase(&self, now: NaiveDateTime) -> VerificationPhase {
        match self.effective_status(now) {
            DomainStatus::Pending => VerificationPhase::Pending,
            DomainStatus::Conflicted => VerificationPhase::Conflicted,
            DomainStatus::Expired => VerificationPhase::Expired,
            DomainStatus::Failed => VerificationPhase::Failed,
            DomainStatus::Verified if self.ssl_status == SslStatus::Active => {
                VerificationPhase::Active
            }
            DomainStatus::Verified => VerificationPhase::Verified,
        }
    }

    pub fn next_check_at(&self) -> Option<NaiveDateTime> {
        self.last_check_at
            .map(|t| t + Duration::minutes(CHECK_COOLDOWN_MINS))
    }

    pub fn attempts_remaining(&self) -> i32 {
        (MAX_ATTEMPTS - self.attempts).max(0)
    }

    pub fn check_rate_limit(&self, now: NaiveDateTime) -> RateLimitDecision {
        if self.attempts < MAX_ATTEMPTS {
            return RateLimitDecision::Proceed { reset: false };
        }
        match self.last_check_at {
            None => RateLimitDecision::Proceed { reset: true },
            Some(last) => {
                let window_end = last + Duration::minutes(THROTTLE_WINDOW_MINS);
                if now >= window_end {
                    RateLimitDecision::Proceed { reset: true }
                } else {
                    RateLimitDecision::Throttled {
                        retry_after: window_end,
                    }
                }
            }
        }
    }

    pub fn with_attempts_reset(&self) -> Self {
        Self {
            attempts: 0,
            ..self.clone()
        }
    }

    /// Fold a probe result into the record. Only probes the tenant asked for
    /// spend the attempt budget; background probes just move the cooldown.
    pub fn after_probe(
        &self,
        verdict: ProbeVerdict,
        now: NaiveDateTime,
        counts_attempt: bool,
    ) -> Self {
        let mut next = self.clone();
        if counts_attempt {
            next.attempts += 1;
        }
        next.last_check_at = Some(now);
        next.updated_at = Some(now);
        match verdict {
            ProbeVerdict::Verified { ssl_status } => {
                next.domain_status = DomainStatus::Verified;
                next.ssl_status = ssl_status;
                next.verified_at = self.verified_at.or(Some(now));
            }
            ProbeVerdict::NotFound => next.domain_status = DomainStatus::Pending,
            ProbeVerdict::Conflicted => next.domain_status = DomainStatus::Conflicted,
        }
        next
    }

    pub fn expired(&self, now: NaiveDateTime) -> Self {
        Self {
            domain_status: DomainStatus::Expired,
            updated_at: Some(now),
            ..self.clone()
        }
    }

    pub fn with_ssl_status(&self, ssl_status: SslStatus, now: NaiveDateTime) -> Self {
        Self {
            ssl_status,
            updated_at: Some(now),
            ..self.clone()
        }
    }

    pub fn activated(&self, now: NaiveDateTime) -> Self {
        Self {
            ssl_status: SslStatus::Active,
            activated_at: self.activated_at.or(Some(now)),
            updated_at: Some(now),
            ..self.clone()
        }
    }

    pub fn ssl_failed(&self, now: NaiveDateTime) -> Self {
        Self {
            domain_status: DomainStatus::Failed,
            ssl_status: SslStatus::Failed,
            updated_at: Some(now),
            ..self.clone()
        }
    }
}
