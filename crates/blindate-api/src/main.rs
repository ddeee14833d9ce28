//! # blindate-api server entry point
//!
//! Reads configuration from the environment, connects to Postgres when
//! `DATABASE_URL` is set (in-memory adapters otherwise) and serves the
//! Axum application until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use blindate_api::middleware::metrics::install_recorder;
use blindate_api::{app, db, AppConfig, AppState};
use blindate_engine::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}: {}", e.field, e.reason))?;

    init_tracing(config.log_json);
    tracing::info!(?config, "starting blindate-api");

    let metrics = if config.metrics_enabled {
        Some(install_recorder().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let state = match config.database_url.clone() {
        Some(url) => {
            let pool = db::connect(&url)
                .await
                .context("failed to connect to PostgreSQL")?;
            if config.migrate_on_start {
                db::run_migrations(&pool)
                    .await
                    .context("failed to apply migrations")?;
            }
            AppState::with_postgres(pool, config.clone())
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; running on in-memory adapters. \
                 State will not survive restarts and the user directory is empty."
            );
            AppState::in_memory(config.clone(), Arc::new(SystemClock)).0
        }
    };
    let state = match metrics {
        Some(handle) => state.with_metrics(handle),
        None => state,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("blindate-api listening on {addr}");

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
