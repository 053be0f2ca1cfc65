pub mod config;
pub mod operations;
pub mod schema;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::config::DbConfig;

#[derive(Clone)]
pub struct DatabaseProxy {
    config: DbConfig,
    pool: SqlitePool,
}

impl DatabaseProxy {
    pub async fn from_env() -> Result<Arc<Self>, DbInitError> {
        Self::connect(DbConfig::from_env()).await
    }

    pub async fn in_memory() -> Result<Arc<Self>, DbInitError> {
        Self::connect(DbConfig::in_memory()).await
    }

    pub async fn connect(config: DbConfig) -> Result<Arc<Self>, DbInitError> {
        if let Some(path) = config.file_path() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| DbInitError::Io(e.to_string()))?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(30));
        if config.is_memory() {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options.max_connections(config.max_connections);
        }

        let pool = pool_options.connect_with(options).await?;
        schema::run_migrations(&pool).await?;

        tracing::info!(url = %redact_url(&config.url), "database ready");

        Ok(Arc::new(Self { config, pool }))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub async fn ping(&self) -> Result<Duration, sqlx::Error> {
        let started = std::time::Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(started.elapsed())
    }
}

fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("IO error: {0}")]
    Io(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
