use crate::config::Config;
use crate::error::{CatalogError, Result};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::info;

/// Create the connection pool for the catalog database
pub fn create_pool(database_url: &str, max_size: u32, timeout: Duration) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(timeout),
            create: Some(timeout),
            recycle: Some(timeout),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| CatalogError::Internal(format!("Failed to create pool: {}", e)))
}

/// Create the pool and make sure the database answers
pub async fn connect(config: &Config) -> Result<Pool> {
    let pool = create_pool(&config.database_url, config.max_connections, config.pool_timeout)?;

    let client = pool.get().await.map_err(|e| CatalogError::ConnectionFailed {
        database: redact(&config.database_url),
        cause: e.to_string(),
    })?;

    // Simple ping query
    client
        .execute("SELECT 1", &[])
        .await
        .map_err(|e| CatalogError::ConnectionFailed {
            database: redact(&config.database_url),
            cause: format!("Ping failed: {}", e),
        })?;

    info!("Connected to PostgreSQL at {}", redact(&config.database_url));
    Ok(pool)
}

/// Strip credentials from a connection URL before it is logged
fn redact(database_url: &str) -> String {
    match (database_url.find("://"), database_url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &database_url[..scheme_end], &database_url[at + 1..])
        }
        _ => database_url.to_string(),
    }
}
