use sqlx::PgPool;

use crate::app_error::AppError;

pub mod audit;
pub mod domain_record;
pub mod tenant;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }
}

/// Unique index guarding one binding per hostname.
const HOSTNAME_UNIQUE: &str = "domain_records_hostname_key";
/// Primary key guarding one binding per tenant.
const TENANT_PKEY: &str = "domain_records_pkey";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => match db_err.constraint() {
                Some(HOSTNAME_UNIQUE) => AppError::HostnameCollision {
                    conflicting_tenant_name: None,
                },
                // Two initiations for the same tenant raced on insert.
                Some(TENANT_PKEY) => AppError::ConcurrentModification,
                _ => {
                    let msg = db_err.message();
                    if msg.contains("duplicate key") || msg.contains("unique constraint") {
                        AppError::InvalidInput("A record with this value already exists".into())
                    } else if msg.contains("foreign key") {
                        AppError::TenantNotFound
                    } else {
                        tracing::error!(error = ?err, "Database error");
                        AppError::Database("Database operation failed".into())
                    }
                }
            },
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
