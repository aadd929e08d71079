//! In-memory implementations of the repository traits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::audit_trail::AuditRepo,
    domain::entities::{
        audit::{DomainConflict, VerificationAttempt},
        domain_record::{DomainRecord, DomainStatus, MAX_ATTEMPTS, SslStatus},
    },
    use_cases::verification::{DomainRecordRepo, TenantRepo, TenantSummary},
};

/// Mirrors the Postgres adapter: one record per tenant, unique hostnames,
/// and version-checked updates.
#[derive(Default)]
pub struct InMemoryDomainRecordRepo {
    pub records: Mutex<HashMap<Uuid, DomainRecord>>,
}

impl InMemoryDomainRecordRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record as-is, bypassing the version check.
    pub fn seed(&self, record: DomainRecord) {
        self.records.lock().unwrap().insert(record.tenant_id, record);
    }

    pub fn get(&self, tenant_id: Uuid) -> Option<DomainRecord> {
        self.records.lock().unwrap().get(&tenant_id).cloned()
    }

    pub fn get_all(&self) -> Vec<DomainRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

fn hostname_taken(records: &HashMap<Uuid, DomainRecord>, hostname: &str, owner: Uuid) -> bool {
    records
        .values()
        .any(|r| r.hostname == hostname && r.tenant_id != owner)
}

#[async_trait]
impl DomainRecordRepo for InMemoryDomainRecordRepo {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<DomainRecord>> {
        Ok(self.get(tenant_id))
    }

    async fn get_by_hostname(&self, hostname: &str) -> AppResult<Option<DomainRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.hostname == hostname)
            .cloned())
    }

    async fn insert(&self, record: &DomainRecord) -> AppResult<DomainRecord> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.tenant_id) {
            return Err(AppError::ConcurrentModification);
        }
        if hostname_taken(&records, &record.hostname, record.tenant_id) {
            return Err(AppError::HostnameCollision {
                conflicting_tenant_name: None,
            });
        }
        let stored = DomainRecord {
            version: 0,
            ..record.clone()
        };
        records.insert(stored.tenant_id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, record: &DomainRecord) -> AppResult<DomainRecord> {
        let mut records = self.records.lock().unwrap();
        let current = records
            .get(&record.tenant_id)
            .ok_or(AppError::ConcurrentModification)?;
        if current.version != record.version {
            return Err(AppError::ConcurrentModification);
        }
        if hostname_taken(&records, &record.hostname, record.tenant_id) {
            return Err(AppError::HostnameCollision {
                conflicting_tenant_name: None,
            });
        }
        let stored = DomainRecord {
            version: record.version + 1,
            ..record.clone()
        };
        records.insert(stored.tenant_id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, tenant_id: Uuid) -> AppResult<()> {
        self.records.lock().unwrap().remove(&tenant_id);
        Ok(())
    }

    async fn list_due_for_check(
        &self,
        checked_before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<DomainRecord>> {
        let mut due: Vec<DomainRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.domain_status.accepts_probe())
            .filter(|r| r.attempts < MAX_ATTEMPTS)
            .filter(|r| r.last_check_at.is_none_or(|t| t < checked_before))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.last_check_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn list_awaiting_activation(&self, limit: i64) -> AppResult<Vec<DomainRecord>> {
        let mut waiting: Vec<DomainRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.domain_status == DomainStatus::Verified)
            .filter(|r| !matches!(r.ssl_status, SslStatus::Active | SslStatus::Failed))
            .cloned()
            .collect();
        waiting.sort_by_key(|r| r.verified_at);
        waiting.truncate(limit.max(0) as usize);
        Ok(waiting)
    }
}

#[derive(Default)]
pub struct InMemoryTenantRepo {
    pub tenants: Mutex<HashMap<Uuid, TenantSummary>>,
}

impl InMemoryTenantRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tenants.lock().unwrap().insert(
            id,
            TenantSummary {
                id,
                name: name.to_string(),
            },
        );
        id
    }
}

#[async_trait]
impl TenantRepo for InMemoryTenantRepo {
    async fn get_by_id(&self, tenant_id: Uuid) -> AppResult<Option<TenantSummary>> {
        Ok(self.tenants.lock().unwrap().get(&tenant_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepo {
    attempts: Mutex<Vec<VerificationAttempt>>,
    conflicts: Mutex<Vec<DomainConflict>>,
}

impl InMemoryAuditRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<VerificationAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn conflicts(&self) -> Vec<DomainConflict> {
        self.conflicts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditRepo for InMemoryAuditRepo {
    async fn insert_attempt(&self, attempt: &VerificationAttempt) -> AppResult<()> {
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn insert_conflict(&self, conflict: &DomainConflict) -> AppResult<()> {
        self.conflicts.lock().unwrap().push(conflict.clone());
        Ok(())
    }

    async fn list_attempts(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<VerificationAttempt>> {
        let mut attempts: Vec<VerificationAttempt> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        attempts.truncate(limit.max(0) as usize);
        Ok(attempts)
    }
}

/// Audit store that fails the first `failing_times` writes.
pub struct FlakyAuditRepo {
    pub inner: InMemoryAuditRepo,
    failing_times: usize,
    failures: AtomicUsize,
}

impl FlakyAuditRepo {
    pub fn failing_times(failing_times: usize) -> Self {
        Self {
            inner: InMemoryAuditRepo::new(),
            failing_times,
            failures: AtomicUsize::new(0),
        }
    }

    fn should_fail(&self) -> bool {
        let seen = self.failures.fetch_add(1, Ordering::SeqCst);
        seen < self.failing_times
    }
}

#[async_trait]
impl AuditRepo for FlakyAuditRepo {
    async fn insert_attempt(&self, attempt: &VerificationAttempt) -> AppResult<()> {
        if self.should_fail() {
            return Err(AppError::Database("audit store down".into()));
        }
        self.inner.insert_attempt(attempt).await
    }

    async fn insert_conflict(&self, conflict: &DomainConflict) -> AppResult<()> {
        if self.should_fail() {
            return Err(AppError::Database("audit store down".into()));
        }
        self.inner.insert_conflict(conflict).await
    }

    async fn list_attempts(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<VerificationAttempt>> {
        self.inner.list_attempts(tenant_id, limit).await
    }
}
