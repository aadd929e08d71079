use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::audit_trail::AuditRepo,
    domain::entities::audit::{AttemptOutcome, DomainConflict, VerificationAttempt},
};

fn row_to_attempt(row: sqlx::postgres::PgRow) -> VerificationAttempt {
    VerificationAttempt {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        hostname: row.get("hostname"),
        verification_target: row.get("verification_target"),
        method: row.get("method"),
        outcome: AttemptOutcome::from_str(row.get("outcome")),
        diagnostic: row.get("diagnostic"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AuditRepo for PostgresPersistence {
    async fn insert_attempt(&self, attempt: &VerificationAttempt) -> AppResult<()> {
        sqlx::query(
            r#"
                INSERT INTO verification_attempts
                    (id, tenant_id, hostname, verification_target, method, outcome, diagnostic, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.tenant_id)
        .bind(&attempt.hostname)
        .bind(&attempt.verification_target)
        .bind(&attempt.method)
        .bind(attempt.outcome.as_str())
        .bind(&attempt.diagnostic)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn insert_conflict(&self, conflict: &DomainConflict) -> AppResult<()> {
        let records = serde_json::to_value(&conflict.conflicting_records)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        sqlx::query(
            r#"
                INSERT INTO domain_conflicts (id, tenant_id, hostname, conflicting_records, created_at)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conflict.id)
        .bind(conflict.tenant_id)
        .bind(&conflict.hostname)
        .bind(records)
        .bind(conflict.created_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_attempts(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<VerificationAttempt>> {
        let rows = sqlx::query(
            r#"
                SELECT id, tenant_id, hostname, verification_target, method, outcome, diagnostic, created_at
                FROM verification_attempts
                WHERE tenant_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_attempt).collect())
    }
}
