use anyhow::Context;
use geturl_relay::app::AppState;
use geturl_relay::config::RelayConfig;
use geturl_relay::provider_manager::ProviderManager;
use geturl_relay::relay::Relay;
use geturl_relay::routes::create_router;
use geturl_relay::{shutdown, sweep_job};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Arc::new(RelayConfig::from_env().context("invalid relay configuration")?);
    tracing::info!(
        provider = ?config.provider,
        location = %config.location,
        resource_group = %config.resource_group,
        "configuration loaded"
    );

    let provider = ProviderManager::get_provider(&config)?;
    let (trigger, signal) = shutdown::channel();

    if let Some(policy) = config.sweep.clone() {
        let provider = provider.clone();
        let signal = signal.clone();
        tokio::spawn(async move {
            sweep_job::run(provider, policy, signal).await;
        });
    }

    let relay = Arc::new(Relay::new(config.clone(), provider, signal)?);
    let app = create_router(AppState::new(relay));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("🚀 geturl relay listening on http://{}", addr);

    // In-flight jobs see the trigger, stop waiting, delete their instance and answer.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.trigger();
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("geturl relay shut down");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (the Functions host stops workers with SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("received shutdown signal");
}
