use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        tracing::info!(
            max_connections = config.db_max_connections,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool, e.g. one built by a test harness.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// True when `err` is a Postgres unique violation, optionally on a named constraint.
pub fn is_unique_violation(err: &anyhow::Error, constraint: Option<&str>) -> bool {
    let Some(db_err) = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|err| err.as_database_error())
    else {
        return false;
    };
    if db_err.code().as_deref() != Some("23505") {
        return false;
    }
    match constraint {
        Some(name) => db_err.constraint().map_or(false, |found| found == name),
        None => true,
    }
}
