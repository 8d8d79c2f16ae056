//! Data access facade.
//!
//! A `Dao` owns one connection pool and exposes the CRUD helpers, the
//! generic executor, introspection, and the transaction scope. Construction
//! is an explicit, awaited startup step ([`Dao::connect`]); inject the
//! instance into whatever needs it instead of sharing ambient global state.
//!
//! All inputs and outputs are JSON-shaped: table names are strings, data and
//! filter mappings are `JsonMap`s, projections are string lists, and rows
//! come back as `JsonMap`s ready for serialization.

use crate::config::DbConfig;
use crate::db::builder::{self, SelectOptions};
use crate::db::executor::{self, ExecResult};
use crate::db::params::Param;
use crate::db::pool::{DbPool, ServerInfo};
use crate::db::schema::{self, ColumnInfo};
use crate::db::transaction::{DbTransaction, TxScope};
use crate::db::types::JsonMap;
use crate::error::{DbError, DbResult};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// One data/filter pair for [`Dao::update_batch`].
#[derive(Debug, Clone, Deserialize)]
pub struct BatchUpdate {
    pub data: JsonMap,
    #[serde(rename = "where", default)]
    pub where_eq: JsonMap,
}

#[derive(Clone)]
pub struct Dao {
    pool: DbPool,
    /// Advisory flag for diagnostics. Not a correctness gate: a
    /// check-then-act race against it is possible and acceptable, the pool
    /// itself rejects statements after close.
    connected: Arc<AtomicBool>,
}

impl Dao {
    /// Create the pool and verify reachability with one diagnostic round
    /// trip. On failure the half-built pool is torn down and the error is
    /// returned; the caller decides whether that is fatal.
    pub async fn connect(config: DbConfig) -> DbResult<Self> {
        let pool = DbPool::create(&config).await?;
        match pool.ping().await {
            Ok(info) => {
                info!(
                    backend = %pool.backend(),
                    version = %info.version,
                    "Connected to database"
                );
            }
            Err(e) => {
                pool.close().await;
                return Err(e);
            }
        }
        Ok(Self {
            pool,
            connected: Arc::new(AtomicBool::new(true)),
        })
    }

    /// The backend this instance talks to.
    pub fn backend(&self) -> crate::config::Backend {
        self.pool.backend()
    }

    /// Advisory connectivity flag (see the field note).
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.pool.is_closed()
    }

    /// Re-run the diagnostic round trip.
    pub async fn ping(&self) -> DbResult<ServerInfo> {
        self.pool.ping().await
    }

    /// Drain and close the pool. Operations issued afterwards fail with a
    /// connection error.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.pool.close().await;
        info!("Connection pool closed");
    }

    /// Run one parameterized statement and collect its row set.
    pub async fn query(&self, sql: &str, params: &[Param]) -> DbResult<ExecResult> {
        executor::fetch(&self.pool, sql, params).await
    }

    /// Run one mutating statement and report affected rows.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> DbResult<ExecResult> {
        executor::execute(&self.pool, sql, params).await
    }

    /// Select matching rows. An empty filter matches all rows; see
    /// [`SelectOptions`] for ordering, projection, and paging.
    pub async fn select_many(&self, table: &str, opts: &SelectOptions) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_select(table, opts)?;
        Ok(executor::fetch(&self.pool, &stmt.sql, &stmt.params)
            .await?
            .rows)
    }

    /// Select the first matching row, or `None` when nothing matches.
    pub async fn select_one(
        &self,
        table: &str,
        where_eq: &JsonMap,
        columns: Option<Vec<String>>,
    ) -> DbResult<Option<JsonMap>> {
        let opts = SelectOptions {
            where_eq: where_eq.clone(),
            limit: Some(1),
            columns,
            ..Default::default()
        };
        let mut rows = self.select_many(table, &opts).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// Insert one row; `data` must be non-empty. Returns the RETURNING
    /// projection of the inserted row.
    pub async fn insert_one(
        &self,
        table: &str,
        data: &JsonMap,
        returning: &[String],
    ) -> DbResult<JsonMap> {
        let stmt = builder::build_insert(table, data, returning)?;
        executor::fetch(&self.pool, &stmt.sql, &stmt.params)
            .await?
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::driver("INSERT reported no row", None))
    }

    /// Insert several rows with one statement. Every row must carry the
    /// identical ordered column set of the first.
    pub async fn insert_many(
        &self,
        table: &str,
        rows: &[JsonMap],
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_insert_many(table, rows, returning)?;
        Ok(executor::fetch(&self.pool, &stmt.sql, &stmt.params)
            .await?
            .rows)
    }

    /// Update matching rows; an empty filter updates every row.
    pub async fn update_many(
        &self,
        table: &str,
        data: &JsonMap,
        where_eq: &JsonMap,
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_update(table, data, where_eq, returning)?;
        Ok(executor::fetch(&self.pool, &stmt.sql, &stmt.params)
            .await?
            .rows)
    }

    /// Apply each data/filter pair as a separate UPDATE inside one
    /// transaction. Any failure rolls back every prior update in the batch.
    /// A pair matching zero rows is not a failure.
    pub async fn update_batch(
        &self,
        table: &str,
        updates: &[BatchUpdate],
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        if updates.is_empty() {
            return Err(DbError::validation(
                "update_batch requires at least one update",
            ));
        }
        let mut scope = self.begin().await?;
        let mut out = Vec::new();
        for update in updates {
            match scope
                .update_many(table, &update.data, &update.where_eq, returning)
                .await
            {
                Ok(rows) => out.extend(rows),
                Err(e) => {
                    if let Err(rollback_err) = scope.rollback().await {
                        warn!(error = %rollback_err, "ROLLBACK failed; propagating the original error");
                    }
                    return Err(e);
                }
            }
        }
        scope
            .commit()
            .await
            .map_err(|e| DbError::transaction("COMMIT failed", e))?;
        Ok(out)
    }

    /// Delete matching rows. An empty filter is rejected as an unsafe
    /// delete before any statement is issued.
    pub async fn delete_many(
        &self,
        table: &str,
        where_eq: &JsonMap,
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_delete(table, where_eq, returning)?;
        Ok(executor::fetch(&self.pool, &stmt.sql, &stmt.params)
            .await?
            .rows)
    }

    /// Check whether a table exists.
    pub async fn table_exists(&self, table: &str) -> DbResult<bool> {
        schema::table_exists(&self.pool, table).await
    }

    /// Describe a table's columns, ordered by ordinal position.
    pub async fn describe_table(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        schema::describe_table(&self.pool, table).await
    }

    /// Run the callback atomically on one connection: acquire, BEGIN,
    /// invoke, then COMMIT on success or ROLLBACK on error. Exactly one
    /// terminal action executes before the connection returns to the pool.
    ///
    /// The callback's own error propagates unchanged after rollback; a
    /// secondary rollback failure is logged and suppressed in its favor. A
    /// COMMIT failure surfaces as a transaction error wrapping the cause.
    ///
    /// ```ignore
    /// let inserted = dao
    ///     .with_transaction(|tx| {
    ///         Box::pin(async move {
    ///             let row = tx.insert_one("events", &payload, &[]).await?;
    ///             tx.update_many("counters", &bump, &filter, &[]).await?;
    ///             Ok(row)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_transaction<T, F>(&self, f: F) -> DbResult<T>
    where
        F: for<'t> FnOnce(&'t mut TxScope) -> BoxFuture<'t, DbResult<T>>,
    {
        let mut scope = self.begin().await?;
        match f(&mut scope).await {
            Ok(value) => match scope.commit().await {
                Ok(()) => Ok(value),
                Err(e) => Err(DbError::transaction("COMMIT failed", e)),
            },
            Err(e) => {
                if let Err(rollback_err) = scope.rollback().await {
                    warn!(error = %rollback_err, "ROLLBACK failed; propagating the original error");
                }
                Err(e)
            }
        }
    }

    async fn begin(&self) -> DbResult<TxScope> {
        let tx = match &self.pool {
            DbPool::Postgres(p) => DbTransaction::Postgres(p.begin().await.map_err(DbError::from)?),
            DbPool::Sqlite(p) => DbTransaction::Sqlite(p.begin().await.map_err(DbError::from)?),
        };
        Ok(TxScope::new(tx))
    }
}

impl std::fmt::Debug for Dao {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("backend", &self.pool.backend())
            .field("connected", &self.is_connected())
            .finish()
    }
}
