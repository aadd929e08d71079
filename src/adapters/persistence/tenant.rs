use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    use_cases::verification::{TenantRepo, TenantSummary},
};

#[async_trait]
impl TenantRepo for PostgresPersistence {
    async fn get_by_id(&self, tenant_id: Uuid) -> AppResult<Option<TenantSummary>> {
        let row = sqlx::query("SELECT id, name FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(|row| TenantSummary {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }
}
