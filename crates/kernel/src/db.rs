//! Database connection pool management.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::Executor;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Create a PostgreSQL connection pool.
///
/// Every new connection gets the configured `statement_timeout` so a runaway
/// listing statement cannot hold a connection indefinitely.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let timeout_ms = config.statement_timeout_ms;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = {timeout_ms}").as_str())
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Check if the database connection is healthy.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
