use std::sync::Arc;

use anyhow::Context;
use butler::{
    config::{ConfigService, JsonFileStore},
    contributors::SyncScheduler,
    infrastructure::environment::{get_config_path, get_contributor_sync_interval},
};
use tracing::info;

mod client;
mod database;
mod logging;
mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logger();
    let db = database::init_database().await?;

    let config_path = get_config_path();
    let config = ConfigService::load(JsonFileStore::new(&config_path))
        .await
        .context("Failed to load bot config")?;
    info!("Loaded config from {}", config_path.display());

    let scheduler = Arc::new(SyncScheduler::new(get_contributor_sync_interval()));
    let mut client =
        client::create_serenity_client(db, config.clone(), scheduler.clone()).await?;
    let shard_manager = client.shard_manager.clone();

    shutdown::run_until_shutdown(client.start(), || async move {
        scheduler.shutdown().await;
        let saved = config.save().await.context("Failed to save config on shutdown");
        shard_manager.shutdown_all().await;
        saved
    })
    .await
}
