use anyhow::Context;
use geturl_service::app::{create_cors, AppState};
use geturl_service::config::ServiceConfig;
use geturl_service::routes::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    let addr = config.listen_addr();
    tracing::info!(url_base = %config.url_base, "configuration loaded");

    let app = create_router(AppState::new(config)).layer(create_cors());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🚀 geturl service listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("geturl service shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
