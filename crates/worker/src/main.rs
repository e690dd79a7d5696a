use std::sync::Arc;

use clubhouse_domain::ports::achievements::ReconciliationStore;
use clubhouse_domain::ports::health::StoreHealth;
use clubhouse_infra::db::{DbConfig, SurrealAdapter};
use clubhouse_infra::repositories::{InMemoryAchievementStore, SurrealAchievementStore};
use clubhouse_infra::{config::AppConfig, logging::init_tracing};
use clubhouse_worker::AchievementSyncWorker;
use clubhouse_worker::observability::init_metrics;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;
    let options = config.sync_options()?;

    if config.metrics_enabled {
        init_metrics(config.metrics_port)?;
    }

    let (store, health) = build_store(&config).await?;
    info!(backend = health.backend(), "store reachable");

    let mut worker = AchievementSyncWorker::new(store, options);
    worker.start()?;
    info!("worker started");

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    worker.stop().await?;
    info!("worker shutdown");

    Ok(())
}

async fn build_store(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn ReconciliationStore>, Arc<dyn StoreHealth>)> {
    if config.uses_surreal() {
        let db_config = DbConfig::from_app_config(config);
        let health: Arc<dyn StoreHealth> = Arc::new(SurrealAdapter::new(db_config.clone()));
        health.health_check().await?;
        let store: Arc<dyn ReconciliationStore> =
            Arc::new(SurrealAchievementStore::connect(&db_config).await?);
        return Ok((store, health));
    }

    let memory = Arc::new(InMemoryAchievementStore::new());
    let store: Arc<dyn ReconciliationStore> = memory.clone();
    let health: Arc<dyn StoreHealth> = memory;
    Ok((store, health))
}
