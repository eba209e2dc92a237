use crate::config::Config;
use crate::error::{Result, StoreError};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

pub fn create_pool(config: &Config) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(config.database_url.clone());
    cfg.application_name = Some(config.application_name.clone());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: config.max_pool_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StoreError::Internal(format!("Failed to create pool: {}", e)))
}

/// Create a pool and verify it with a ping query.
pub async fn connect(config: &Config) -> Result<Pool> {
    let pool = create_pool(config)?;
    ping(&pool, &config.database_name).await?;
    info!("Connected to PostgreSQL database {}", config.database_name);
    Ok(pool)
}

pub async fn ping(pool: &Pool, database: &str) -> Result<()> {
    let client = pool.get().await.map_err(|e| StoreError::ConnectionFailed {
        database: database.to_string(),
        cause: e.to_string(),
    })?;

    client
        .execute("SELECT 1", &[])
        .await
        .map_err(|e| StoreError::ConnectionFailed {
            database: database.to_string(),
            cause: format!("Ping failed: {}", e),
        })?;

    Ok(())
}
