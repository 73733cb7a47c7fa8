pub mod post_repo;
pub mod records;

use crate::config::DatabaseConfig;
use crate::error::Result;
use backon::{ExponentialBuilder, Retryable};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub use post_repo::{PgPostStore, PostRepository};

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await
}

/// Initializes the pool, retrying with exponential backoff while the database is unreachable.
///
/// # Errors
/// Returns the last `sqlx::Error` once all attempts are exhausted.
pub async fn connect_with_retry(config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error> {
    let retry_strategy = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(config.max_backoff_secs))
        .with_max_times(config.connect_attempts);

    (|| init_pool(config))
        .retry(retry_strategy)
        .notify(|e, duration| {
            tracing::warn!(error = %e, retry_in = ?duration, "Database unavailable, retrying...");
        })
        .await
}

/// Applies pending schema migrations.
///
/// # Errors
/// Returns `AppError::Migration` if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!().run(pool).await?;
    Ok(())
}
