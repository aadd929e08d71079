use thiserror::Error;

use crate::app_error::AppError;

/// Startup failures.
///
/// Display messages are safe for logs; Debug includes the #[source] chain,
/// which may contain connection strings. Log with `%e`, not `?e`.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Database connection failed. Check DATABASE_URL and ensure the database is running.")]
    DatabaseConnection(#[source] sqlx::Error),

    #[error("Configuration error: environment variable {var} not set")]
    ConfigMissing { var: &'static str },

    #[error("DNS resolver initialization failed")]
    ResolverInit(#[source] AppError),

    #[error("SSL provisioner initialization failed")]
    ProvisionerInit(#[source] AppError),
}

impl From<sqlx::Error> for InfraError {
    fn from(e: sqlx::Error) -> Self {
        InfraError::DatabaseConnection(e)
    }
}
