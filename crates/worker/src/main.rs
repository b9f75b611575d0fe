//! Standalone retry sweep.
//!
//! Runs [`hookline_events::RetryScheduler`] against Postgres without serving
//! HTTP. Any number of workers may run side by side; claims keep each due
//! retry with exactly one of them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hookline_events::{secret_cipher_from_env, DeliveryConfig, PgStore, WebhookSystem};

/// How long shutdown waits for an in-progress sweep.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hookline_worker=debug,hookline_events=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let config = DeliveryConfig::from_env();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .unwrap_or_else(|_| hookline_db::DEFAULT_MAX_CONNECTIONS.to_string())
        .parse()
        .expect("DATABASE_MAX_CONNECTIONS must be a valid u32");

    let pool = hookline_db::create_pool(&database_url, max_connections)
        .await
        .expect("Failed to connect to database");
    hookline_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    let webhooks = WebhookSystem::new(
        Arc::new(PgStore::new(pool)),
        secret_cipher_from_env(),
        &config,
    )
    .expect("Failed to build webhook services");

    let cancel = CancellationToken::new();
    let scheduler = webhooks.scheduler.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { scheduler.run(token).await });

    tracing::info!(
        interval_secs = config.retry_interval.as_secs(),
        batch_size = config.retry_batch_size,
        "Worker started"
    );

    shutdown_signal().await;
    cancel.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
        tracing::warn!("Retry scheduler did not stop in time");
    }
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
