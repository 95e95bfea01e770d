// Shared initialization helpers for binaries

use crate::config::Settings;
use crate::db::DbPool;
use anyhow::{Context, Result};
use tracing::info;

/// Initialize the database pool
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Initialize the Redis client used for callback rate limiting
#[tracing::instrument(skip(settings))]
pub fn init_redis_client(settings: &Settings) -> Result<redis::Client> {
    let client = redis::Client::open(settings.redis.url.as_str())
        .context("Failed to create Redis client")?;

    info!("Redis client initialized");
    Ok(client)
}
