use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use tracing::info;

use custom_domain_api::infra::{
    app::create_app,
    domain_verifier::run_domain_verification_loop,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    tokio::spawn(run_domain_verification_loop(
        app_state.verification_use_cases.clone(),
        app_state.activation_use_cases.clone(),
        Duration::from_secs(app_state.config.verification_poll_secs.max(1)),
        app_state.config.verification_poll_concurrency,
    ));

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
