mod aggregate;
mod api;
mod config;
mod db;
mod detector;
mod error;
mod fetcher;
mod lifecycle;
mod orchestrator;
mod refresh;
mod scorer;
mod state;
mod types;

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::latency::LatencyStats;
use crate::api::ApiState;
use crate::config::Config;
use crate::lifecycle::{LifecycleManager, SweepRunner};
use crate::orchestrator::DetectionOrchestrator;
use crate::refresh::OddsRefresher;
use crate::state::GameStore;

#[tokio::main]
async fn main() -> error::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        db_path = %config.db_path,
        api_port = config.api_port,
        sharp_book = %config.sharp_book,
        sports = ?config.sports,
        "edgewatch starting"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{}?mode=rwc", config.db_path))
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = GameStore::new();
    let latency = LatencyStats::new();
    let manager = Arc::new(LifecycleManager::new(pool.clone()));
    let orchestrator = Arc::new(DetectionOrchestrator::new(
        pool.clone(),
        &config,
        manager.clone(),
        store.clone(),
        latency.clone(),
    ));

    // Warm the store before serving so single-game triggers resolve
    // immediately after startup.
    let refresher = OddsRefresher::new(&config, pool.clone(), store.clone(), orchestrator.clone());
    let synced = refresher.sync_once().await;
    info!(games = synced, "bootstrap odds sync complete");
    tokio::spawn(refresher.run());

    tokio::spawn(SweepRunner::new(manager.clone(), store.clone()).run());

    let state = ApiState {
        orchestrator,
        manager,
        store,
        latency,
        cron_secret: config.cron_secret.clone(),
    };
    api::serve(state, config.api_port).await
}
