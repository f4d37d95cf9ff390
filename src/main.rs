mod admission;
mod backend;
mod config;
mod error;
mod http_client;
mod server;

use std::net::SocketAddr;

use tracing_subscriber::{EnvFilter, fmt};

use crate::admission::AdmissionControl;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_gateway=info,tower_http=info"));
    fmt().with_env_filter(filter).init();

    let config = config::Settings::load()?;

    let admission = AdmissionControl::new(&config.rate_limit);
    admission.start();

    // Use configured host/port to bind the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::create_app(config, &admission)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gateway server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    admission.stop().await;
    tracing::info!("Gateway server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
