//! Transaction scope: a sequence of operations on one connection.
//!
//! A `TxScope` is handed to the callback of [`crate::Dao::with_transaction`].
//! Every helper invoked through it runs on the transaction's connection
//! rather than acquiring from the pool, so all statements share one
//! transaction context and execute strictly in the order issued. The scope
//! cannot begin another transaction; same-connection nesting is
//! unrepresentable.

use crate::db::builder::{self, SelectOptions};
use crate::db::executor::{ExecResult, sql_preview};
use crate::db::params::{Param, bind_pg_param, bind_sqlite_param};
use crate::db::types::{JsonMap, RowToJson};
use crate::error::{DbError, DbResult};
use sqlx::{Postgres, Sqlite, Transaction};
use std::time::Instant;
use tracing::{debug, warn};

/// Backend-specific transaction wrapper.
pub(crate) enum DbTransaction {
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

/// Handle bound to one in-flight transaction.
pub struct TxScope {
    tx: DbTransaction,
}

impl TxScope {
    pub(crate) fn new(tx: DbTransaction) -> Self {
        Self { tx }
    }

    /// Commit the transaction. Exactly one of commit/rollback runs per
    /// scope; [`crate::Dao::with_transaction`] enforces this.
    pub(crate) async fn commit(self) -> DbResult<()> {
        match self.tx {
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Sqlite(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    /// Roll the transaction back.
    pub(crate) async fn rollback(self) -> DbResult<()> {
        match self.tx {
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Sqlite(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }

    async fn fetch(&mut self, sql: &str, params: &[Param]) -> DbResult<Vec<JsonMap>> {
        let start = Instant::now();
        let result: DbResult<Vec<JsonMap>> = match &mut self.tx {
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_pg_param(query, param);
                }
                query
                    .fetch_all(&mut **tx)
                    .await
                    .map(|rows| rows.iter().map(|r| r.to_json_map()).collect())
                    .map_err(DbError::from)
            }
            DbTransaction::Sqlite(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query
                    .fetch_all(&mut **tx)
                    .await
                    .map(|rows| rows.iter().map(|r| r.to_json_map()).collect())
                    .map_err(DbError::from)
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(rows) => debug!(
                sql = %sql_preview(sql),
                rows = rows.len(),
                elapsed_ms,
                "Statement completed in transaction"
            ),
            Err(e) => warn!(
                sql = %sql_preview(sql),
                elapsed_ms,
                error = %e,
                "Statement failed in transaction"
            ),
        }
        result
    }

    /// Run one parameterized statement on the transaction's connection and
    /// collect its row set.
    pub async fn query(&mut self, sql: &str, params: &[Param]) -> DbResult<ExecResult> {
        let start = Instant::now();
        let rows = self.fetch(sql, params).await?;
        Ok(ExecResult {
            rows_affected: rows.len() as u64,
            rows,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run one mutating statement on the transaction's connection.
    pub async fn execute(&mut self, sql: &str, params: &[Param]) -> DbResult<ExecResult> {
        let start = Instant::now();
        let result: DbResult<u64> = match &mut self.tx {
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_pg_param(query, param);
                }
                query
                    .execute(&mut **tx)
                    .await
                    .map(|r| r.rows_affected())
                    .map_err(DbError::from)
            }
            DbTransaction::Sqlite(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query
                    .execute(&mut **tx)
                    .await
                    .map(|r| r.rows_affected())
                    .map_err(DbError::from)
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(rows_affected) => debug!(
                sql = %sql_preview(sql),
                rows_affected = *rows_affected,
                elapsed_ms,
                "Statement executed in transaction"
            ),
            Err(e) => warn!(
                sql = %sql_preview(sql),
                elapsed_ms,
                error = %e,
                "Statement failed in transaction"
            ),
        }
        Ok(ExecResult {
            rows: Vec::new(),
            rows_affected: result?,
            elapsed_ms,
        })
    }

    /// Select matching rows. Same contract as [`crate::Dao::select_many`].
    pub async fn select_many(
        &mut self,
        table: &str,
        opts: &SelectOptions,
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_select(table, opts)?;
        self.fetch(&stmt.sql, &stmt.params).await
    }

    /// Select the first matching row, or `None` when nothing matches.
    pub async fn select_one(
        &mut self,
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

    /// Insert one row and return its RETURNING projection.
    pub async fn insert_one(
        &mut self,
        table: &str,
        data: &JsonMap,
        returning: &[String],
    ) -> DbResult<JsonMap> {
        let stmt = builder::build_insert(table, data, returning)?;
        let rows = self.fetch(&stmt.sql, &stmt.params).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::driver("INSERT reported no row", None))
    }

    /// Insert several rows with one statement.
    pub async fn insert_many(
        &mut self,
        table: &str,
        rows: &[JsonMap],
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_insert_many(table, rows, returning)?;
        self.fetch(&stmt.sql, &stmt.params).await
    }

    /// Update matching rows; an empty filter updates every row.
    pub async fn update_many(
        &mut self,
        table: &str,
        data: &JsonMap,
        where_eq: &JsonMap,
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_update(table, data, where_eq, returning)?;
        self.fetch(&stmt.sql, &stmt.params).await
    }

    /// Delete matching rows; an empty filter is rejected as unsafe.
    pub async fn delete_many(
        &mut self,
        table: &str,
        where_eq: &JsonMap,
        returning: &[String],
    ) -> DbResult<Vec<JsonMap>> {
        let stmt = builder::build_delete(table, where_eq, returning)?;
        self.fetch(&stmt.sql, &stmt.params).await
    }
}
