use std::sync::Arc;

use anyhow::Context;

use web2wire_api::{app, shutdown};
use web2wire_infra::BrokerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    web2wire_observability::init();

    let config = BrokerConfig::from_env().context("invalid configuration")?;
    let shutdown = shutdown::install_shutdown_handler();

    let services = Arc::new(
        app::services::build_services(&config, shutdown.clone())
            .await
            .context("failed to wire services")?,
    );
    let dispatcher = services.dispatcher.clone();
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        device_url = %config.device_url,
        max_queue_size = config.max_queue_size,
        "listening"
    );

    let stop = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
        .context("server error")?;

    dispatcher.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}
