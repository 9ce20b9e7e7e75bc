//! goflex-edge server binary.

use goflex_edge::{AppState, EdgeConfig, observability, router};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init()?;

    let config = EdgeConfig::load()?;
    let state = AppState::from_config(&config);
    if !state.is_configured() {
        warn!("SMTP_USER or SMTP_PASS is not set; sending endpoints will answer 503");
    }
    if state.admin_emails().is_empty() {
        warn!("ADMIN_EMAILS is empty; /admin-test-email will answer 503");
    }

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        addr = %listener.local_addr()?,
        relay = %config.smtp_host,
        port = config.smtp_port,
        "goflex-edge listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("goflex-edge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
