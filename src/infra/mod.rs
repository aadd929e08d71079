use crate::{
    adapters::persistence::PostgresPersistence,
    infra::{db::init_db, error::InfraError},
};

pub mod app;
pub mod config;
pub mod db;
pub mod domain_verifier;
pub mod error;
pub mod http_client;
pub mod setup;
pub mod signature;

pub async fn postgres_persistence(database_url: &str) -> Result<PostgresPersistence, InfraError> {
    let pool = init_db(database_url).await?;
    Ok(PostgresPersistence::new(pool))
}
