pub mod domain;
pub mod ssl;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/tenants", domain::tenant_router())
        .nest("/domains", domain::public_router())
        .nest("/ssl", ssl::router())
}
