use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::storage::S3ObjectStore;
use tracing::info;

use server::config::AppConfig;
use server::database::init_db;
use server::identity::GoTrueIdentity;
use server::services::reconcile::{SweeperConfig, run_pending_sweeper};
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    info!("Database ready");

    let object_store = Arc::new(
        S3ObjectStore::new(&config.storage.s3_settings())
            .context("Failed to configure object storage")?,
    );
    let identity = Arc::new(
        GoTrueIdentity::new(&config.auth.identity_url, &config.auth.identity_public_key)
            .context("Failed to configure identity client")?,
    );

    let sweeper = tokio::spawn(run_pending_sweeper(
        db.clone(),
        object_store.clone(),
        SweeperConfig {
            interval: Duration::from_secs(config.upload.sweep_interval_secs.max(1)),
            max_pending_age: config.pending_max_age(),
        },
    ));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db,
        config,
        object_store,
        identity,
    };
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
