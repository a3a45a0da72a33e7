use compliance_backend::api;
use compliance_backend::config::Config;
use compliance_backend::errors::ApiError;
use compliance_backend::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        ApiError::Internal
    })?;
    let addr = config.server.addr.clone();

    let state = AppState::bootstrap(config).await?;
    tracing::info!(circuits = ?state.service.engine().registry().ids(), "circuits registered");

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(%addr, "compliance backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .map_err(|_| ApiError::Internal)?;

    Ok(())
}
