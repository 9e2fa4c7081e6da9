use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::config::CacheConfig;

/// Migrations embedded at compile time from `crates/adpilot-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Create a connection pool for the cache, creating the file if missing.
///
/// In-memory caches are limited to a single long-lived connection, since
/// every SQLite memory connection is its own database.
pub async fn create_pool(config: &CacheConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid cache URL {}", config.database_url))?
        .create_if_missing(true);

    let pool_options = if config.is_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open cache at {}", config.database_url))?;
    Ok(pool)
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run cache migrations")?;

    info!("cache migrations applied");
    Ok(())
}

/// Ensure the directory holding the cache file exists.
///
/// No-op for in-memory caches.
pub fn ensure_cache_dir(config: &CacheConfig) -> Result<()> {
    let Some(path) = config.database_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache directory {}", dir.display()))?;
    }
    Ok(())
}

/// Open the cache described by `config`: create its directory, connect,
/// and apply migrations.
pub async fn open_cache(config: &CacheConfig) -> Result<SqlitePool> {
    ensure_cache_dir(config)?;
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
