use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only challenge method this service issues.
pub const VERIFICATION_METHOD_CNAME: &str = "cname";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DnsRecordType {
    #[serde(rename = "CNAME")]
    Cname,
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "TXT")]
    Txt,
}

impl DnsRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsRecordType::Cname => "CNAME",
            DnsRecordType::A => "A",
            DnsRecordType::Aaaa => "AAAA",
            DnsRecordType::Txt => "TXT",
        }
    }

    /// Record types that block a CNAME at the same name.
    pub fn conflict_types() -> &'static [DnsRecordType] {
        &[DnsRecordType::A, DnsRecordType::Aaaa, DnsRecordType::Txt]
    }
}

impl std::fmt::Display for DnsRecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingRecord {
    #[serde(rename = "type")]
    pub record_type: DnsRecordType,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Verified,
    Failed,
    Conflicted,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Verified => "verified",
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::Conflicted => "conflicted",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "verified" => AttemptOutcome::Verified,
            "conflicted" => AttemptOutcome::Conflicted,
            _ => AttemptOutcome::Failed,
        }
    }
}

/// One DNS probe, as recorded for diagnostics and abuse review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationAttempt {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub hostname: String,
    pub verification_target: String,
    pub method: String,
    pub outcome: AttemptOutcome,
    pub diagnostic: serde_json::Value,
    pub created_at: NaiveDateTime,
}

/// Non-CNAME records found at a hostname that explain a failed probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainConflict {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub hostname: String,
    pub conflicting_records: Vec<ConflictingRecord>,
    pub created_at: NaiveDateTime,
}
