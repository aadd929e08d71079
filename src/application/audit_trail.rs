use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::{
    app_error::{AppResult, AuditError},
    application::dns_probe::Propagation,
    domain::entities::audit::{DomainConflict, VerificationAttempt},
};

/// Writes per attempt before the failure is handed back to the caller.
const WRITE_TRIES: usize = 2;

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn insert_attempt(&self, attempt: &VerificationAttempt) -> AppResult<()>;
    async fn insert_conflict(&self, conflict: &DomainConflict) -> AppResult<()>;
    /// Newest first.
    async fn list_attempts(&self, tenant_id: Uuid, limit: i64)
    -> AppResult<Vec<VerificationAttempt>>;
}

/// Append-only record of probes and conflicts.
///
/// Writes report failures through `AuditError` instead of `AppError`; the
/// verification flow logs them and continues.
#[derive(Clone)]
pub struct AuditTrail {
    repo: Arc<dyn AuditRepo>,
}

impl AuditTrail {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    pub async fn record_attempt(&self, attempt: &VerificationAttempt) -> Result<(), AuditError> {
        let mut last_err = None;
        for _ in 0..WRITE_TRIES {
            match self.repo.insert_attempt(attempt).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt_id = %attempt.id, error = %e, "Audit attempt write failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.map(AuditError::from).unwrap_or_else(|| {
            AuditError::Store("audit write not attempted".into())
        }))
    }

    pub async fn record_conflict(&self, conflict: &DomainConflict) -> Result<(), AuditError> {
        let mut last_err = None;
        for _ in 0..WRITE_TRIES {
            match self.repo.insert_conflict(conflict).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(conflict_id = %conflict.id, error = %e, "Audit conflict write failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.map(AuditError::from).unwrap_or_else(|| {
            AuditError::Store("audit write not attempted".into())
        }))
    }

    pub async fn attempts_for(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<VerificationAttempt>> {
        self.repo.list_attempts(tenant_id, limit).await
    }

    /// Propagation state seen by the most recent probe, if one was recorded.
    pub async fn latest_propagation(&self, tenant_id: Uuid) -> Option<Propagation> {
        let attempts = match self.repo.list_attempts(tenant_id, 1).await {
            Ok(a) => a,
            Err(e) => {
                warn!(tenant_id = %tenant_id, error = %e, "Failed to read latest attempt");
                return None;
            }
        };
        let state = attempts.first()?.diagnostic.get("propagation")?.get("state")?;
        serde_json::from_value(state.clone()).ok()
    }
}
