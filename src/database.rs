use anyhow::{Context, Result};
use butler::infrastructure::environment::{self, env_var_with_context, get_data_directory};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

/// Connects to `DATABASE_URL` and migrates it to the latest schema.
pub async fn init_database() -> Result<DatabaseConnection> {
    ensure_data_dir_created()?;
    let db = create_db_pool().await?;
    init_db(&db).await?;

    Ok(db)
}

fn ensure_data_dir_created() -> Result<()> {
    let path = get_data_directory();
    std::fs::create_dir_all(&path).context(format!("Failed to create data directory {:?}", path))
}

async fn create_db_pool() -> Result<DatabaseConnection> {
    let db_url = env_var_with_context(environment::DATABASE_URL)?;
    let mut opt = ConnectOptions::new(db_url);
    opt.sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .context("Failed to connect to the linked account database")?;
    Ok(db)
}

async fn init_db(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("Failed to migrate database to latest")?;
    info!("Database initialized.");
    Ok(())
}
