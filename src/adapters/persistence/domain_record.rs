use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::domain_record::{DomainRecord, DomainStatus, MAX_ATTEMPTS, SslStatus},
    use_cases::verification::DomainRecordRepo,
};

const COLUMNS: &str = "tenant_id, hostname, apex_domain, subdomain, verification_token, \
    verification_target, token_issued_at, token_expires_at, attempts, last_check_at, \
    domain_status, ssl_status, verified_at, activated_at, version, created_at, updated_at";

fn row_to_record(row: sqlx::postgres::PgRow) -> DomainRecord {
    DomainRecord {
        tenant_id: row.get("tenant_id"),
        hostname: row.get("hostname"),
        apex_domain: row.get("apex_domain"),
        subdomain: row.get("subdomain"),
        verification_token: row.get("verification_token"),
        verification_target: row.get("verification_target"),
        token_issued_at: row.get("token_issued_at"),
        token_expires_at: row.get("token_expires_at"),
        attempts: row.get("attempts"),
        last_check_at: row.get("last_check_at"),
        domain_status: DomainStatus::from_str(row.get("domain_status")),
        ssl_status: SslStatus::from_str(row.get("ssl_status")),
        verified_at: row.get("verified_at"),
        activated_at: row.get("activated_at"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl DomainRecordRepo for PostgresPersistence {
    async fn get_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<DomainRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM domain_records WHERE tenant_id = $1");
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_record))
    }

    async fn get_by_hostname(&self, hostname: &str) -> AppResult<Option<DomainRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM domain_records WHERE hostname = $1");
        let row = sqlx::query(&sql)
            .bind(hostname)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_record))
    }

    async fn insert(&self, record: &DomainRecord) -> AppResult<DomainRecord> {
        let sql = format!(
            r#"
                INSERT INTO domain_records (
                    tenant_id, hostname, apex_domain, subdomain, verification_token,
                    verification_target, token_issued_at, token_expires_at, attempts,
                    last_check_at, domain_status, ssl_status, verified_at, activated_at, version
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0)
                RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(record.tenant_id)
            .bind(&record.hostname)
            .bind(&record.apex_domain)
            .bind(&record.subdomain)
            .bind(&record.verification_token)
            .bind(&record.verification_target)
            .bind(record.token_issued_at)
            .bind(record.token_expires_at)
            .bind(record.attempts)
            .bind(record.last_check_at)
            .bind(record.domain_status.as_str())
            .bind(record.ssl_status.as_str())
            .bind(record.verified_at)
            .bind(record.activated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row_to_record(row))
    }

    async fn update(&self, record: &DomainRecord) -> AppResult<DomainRecord> {
        let sql = format!(
            r#"
                UPDATE domain_records
                SET hostname = $2,
                    apex_domain = $3,
                    subdomain = $4,
                    verification_token = $5,
                    verification_target = $6,
                    token_issued_at = $7,
                    token_expires_at = $8,
                    attempts = $9,
                    last_check_at = $10,
                    domain_status = $11,
                    ssl_status = $12,
                    verified_at = $13,
                    activated_at = $14,
                    version = version + 1,
                    updated_at = CURRENT_TIMESTAMP
                WHERE tenant_id = $1 AND version = $15
                RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(record.tenant_id)
            .bind(&record.hostname)
            .bind(&record.apex_domain)
            .bind(&record.subdomain)
            .bind(&record.verification_token)
            .bind(&record.verification_target)
            .bind(record.token_issued_at)
            .bind(record.token_expires_at)
            .bind(record.attempts)
            .bind(record.last_check_at)
            .bind(record.domain_status.as_str())
            .bind(record.ssl_status.as_str())
            .bind(record.verified_at)
            .bind(record.activated_at)
            .bind(record.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        // No row means the version moved on, or the record was deleted underneath us.
        row.map(row_to_record)
            .ok_or(AppError::ConcurrentModification)
    }

    async fn delete(&self, tenant_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM domain_records WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_due_for_check(
        &self,
        checked_before: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<DomainRecord>> {
        let sql = format!(
            r#"
                SELECT {COLUMNS}
                FROM domain_records
                WHERE domain_status IN ('pending', 'conflicted')
                  AND (last_check_at IS NULL OR last_check_at < $1)
                  AND attempts < $3
                ORDER BY last_check_at ASC NULLS FIRST
                LIMIT $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(checked_before)
            .bind(limit)
            .bind(MAX_ATTEMPTS)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }

    async fn list_awaiting_activation(&self, limit: i64) -> AppResult<Vec<DomainRecord>> {
        let sql = format!(
            r#"
                SELECT {COLUMNS}
                FROM domain_records
                WHERE domain_status = 'verified'
                  AND ssl_status NOT IN ('active', 'failed')
                ORDER BY verified_at ASC
                LIMIT $1
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }
}
