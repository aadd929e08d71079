use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Apex domains cannot be used directly, try {suggestion}")]
    ApexDomainRejected { suggestion: String },

    #[error("Hostname is already claimed by another tenant")]
    HostnameCollision {
        conflicting_tenant_name: Option<String>,
    },

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("No verification challenge in progress")]
    NoChallengeInProgress,

    #[error("Verification challenge expired at {expired_at}")]
    ChallengeExpired { expired_at: NaiveDateTime },

    #[error("Too many verification attempts, retry after {next_retry_after}")]
    Throttled {
        attempts_remaining: i32,
        next_retry_after: NaiveDateTime,
    },

    #[error("Domain is already verified")]
    AlreadyVerified,

    #[error("Domain record was modified concurrently")]
    ConcurrentModification,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidHostname,
    ApexDomainRejected,
    HostnameCollision,
    TenantNotFound,
    NoChallengeInProgress,
    ChallengeExpired,
    Throttled,
    AlreadyVerified,
    ConcurrentModification,
    InvalidSignature,
    InvalidInput,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidHostname => "INVALID_HOSTNAME",
            ErrorCode::ApexDomainRejected => "APEX_DOMAIN_REJECTED",
            ErrorCode::HostnameCollision => "HOSTNAME_COLLISION",
            ErrorCode::TenantNotFound => "TENANT_NOT_FOUND",
            ErrorCode::NoChallengeInProgress => "NO_CHALLENGE_IN_PROGRESS",
            ErrorCode::ChallengeExpired => "CHALLENGE_EXPIRED",
            ErrorCode::Throttled => "THROTTLED",
            ErrorCode::AlreadyVerified => "ALREADY_VERIFIED",
            ErrorCode::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failures of the best-effort audit side channel. Never converted into
/// `AppError`; callers log these and carry on.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit store unavailable: {0}")]
    Store(String),
}

impl From<AppError> for AuditError {
    fn from(err: AppError) -> Self {
        AuditError::Store(err.to_string())
    }
}
