//! Connection pool creation and lifecycle.
//!
//! One `DbPool` wraps one backend-specific sqlx pool. sqlx owns acquisition
//! and release: single-shot statements check a connection out and return it
//! on every exit path, so exhaustion surfaces as `PoolTimeout` rather than
//! leaked connections.

use crate::config::{Backend, DbConfig};
use crate::error::{DbError, DbResult};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Backend-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Result of the diagnostic round trip performed at startup.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server-side current timestamp, as reported by the database.
    pub now: String,
    /// Server version string.
    pub version: String,
}

impl DbPool {
    /// Create a connection pool for the given configuration. The pool is
    /// lazy; reachability is checked by [`DbPool::ping`].
    pub(crate) async fn create(config: &DbConfig) -> DbResult<Self> {
        config.pool.validate()?;
        let settings = &config.pool;
        let acquire_timeout = Duration::from_secs(settings.acquire_timeout_or_default());
        let idle_timeout = Some(Duration::from_secs(settings.idle_timeout_or_default()));

        match config.backend {
            Backend::Postgres => {
                let pool = PgPoolOptions::new()
                    .min_connections(settings.min_connections_or_default())
                    .max_connections(settings.max_connections_or_default(config.backend))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(settings.test_before_acquire_or_default())
                    .connect(&config.url)
                    .await
                    .map_err(|e| {
                        DbError::connection(format!("Failed to create pool: {}", e))
                    })?;
                Ok(DbPool::Postgres(pool))
            }
            Backend::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)
                    .map_err(|e| {
                        DbError::connection(format!("Invalid SQLite connection string: {}", e))
                    })?
                    .create_if_missing(true);

                let pool = SqlitePoolOptions::new()
                    .min_connections(settings.min_connections_or_default())
                    .max_connections(settings.max_connections_or_default(config.backend))
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .test_before_acquire(settings.test_before_acquire_or_default())
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        DbError::connection(format!("Failed to create pool: {}", e))
                    })?;
                Ok(DbPool::Sqlite(pool))
            }
        }
    }

    /// Get the backend for this pool.
    pub fn backend(&self) -> Backend {
        match self {
            DbPool::Postgres(_) => Backend::Postgres,
            DbPool::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// One diagnostic round trip: server time and version.
    pub async fn ping(&self) -> DbResult<ServerInfo> {
        let info = match self {
            DbPool::Postgres(pool) => {
                let row = sqlx::query("SELECT now()::text AS now, version() AS version")
                    .fetch_one(pool)
                    .await
                    .map_err(DbError::from)?;
                ServerInfo {
                    now: row.try_get("now").map_err(DbError::from)?,
                    version: row.try_get("version").map_err(DbError::from)?,
                }
            }
            DbPool::Sqlite(pool) => {
                let row =
                    sqlx::query("SELECT datetime('now') AS now, sqlite_version() AS version")
                        .fetch_one(pool)
                        .await
                        .map_err(DbError::from)?;
                ServerInfo {
                    now: row.try_get("now").map_err(DbError::from)?,
                    version: row.try_get("version").map_err(DbError::from)?,
                }
            }
        };
        debug!(version = %info.version, "Database reachable");
        Ok(info)
    }

    /// Drain and close all connections. Statements issued afterwards fail
    /// with a connection error.
    pub async fn close(&self) {
        if self.is_closed() {
            warn!("Pool close requested more than once");
            return;
        }
        match self {
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    /// Check whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::Postgres(pool) => pool.is_closed(),
            DbPool::Sqlite(pool) => pool.is_closed(),
        }
    }
}
