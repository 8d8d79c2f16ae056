//! Single-shot statement execution.
//!
//! Each call checks one connection out of the pool, runs one parameterized
//! statement, and returns the row set plus a row count. Release is scoped:
//! sqlx returns the connection on every exit path, including failures. Every
//! completion emits a timing observation with a bounded statement preview;
//! the observation never alters control flow.
//!
//! When the parameter list is empty the statement is executed unprepared.
//! Some statements (DDL on certain servers) reject the prepared path, and a
//! parameterless statement gains nothing from it.

use crate::db::params::{Param, bind_pg_param, bind_sqlite_param};
use crate::db::pool::DbPool;
use crate::db::types::{JsonMap, RowToJson};
use crate::error::{DbError, DbResult};
use futures_util::TryStreamExt;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum statement length reproduced in timing observations.
pub(crate) const SQL_PREVIEW_LEN: usize = 120;

/// Rows and counts from one executed statement.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    /// Result rows, possibly empty. For mutating statements these are the
    /// RETURNING projections.
    pub rows: Vec<JsonMap>,
    /// Rows affected for mutating statements; row count for fetches.
    pub rows_affected: u64,
    pub elapsed_ms: u64,
}

/// Truncate a statement for log output, respecting char boundaries.
pub(crate) fn sql_preview(sql: &str) -> String {
    if sql.len() <= SQL_PREVIEW_LEN {
        return sql.to_string();
    }
    let mut end = SQL_PREVIEW_LEN;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

fn observe(sql: &str, start: Instant, outcome: &DbResult<ExecResult>) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(result) => debug!(
            sql = %sql_preview(sql),
            rows = result.rows.len(),
            rows_affected = result.rows_affected,
            elapsed_ms,
            "Statement completed"
        ),
        Err(e) => warn!(
            sql = %sql_preview(sql),
            elapsed_ms,
            error = %e,
            "Statement failed"
        ),
    }
}

/// Run one statement and collect its row set.
pub(crate) async fn fetch(pool: &DbPool, sql: &str, params: &[Param]) -> DbResult<ExecResult> {
    let start = Instant::now();
    let outcome = fetch_inner(pool, sql, params, start).await;
    observe(sql, start, &outcome);
    outcome
}

async fn fetch_inner(
    pool: &DbPool,
    sql: &str,
    params: &[Param],
    start: Instant,
) -> DbResult<ExecResult> {
    let rows = match pool {
        DbPool::Postgres(p) => {
            let rows: Vec<sqlx::postgres::PgRow> = if params.is_empty() {
                use sqlx::Executor;
                p.fetch(sql).try_collect().await.map_err(DbError::from)?
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_pg_param(query, param);
                }
                query.fetch_all(p).await.map_err(DbError::from)?
            };
            rows.iter().map(|r| r.to_json_map()).collect::<Vec<_>>()
        }
        DbPool::Sqlite(p) => {
            let rows: Vec<sqlx::sqlite::SqliteRow> = if params.is_empty() {
                use sqlx::Executor;
                p.fetch(sql).try_collect().await.map_err(DbError::from)?
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query.fetch_all(p).await.map_err(DbError::from)?
            };
            rows.iter().map(|r| r.to_json_map()).collect::<Vec<_>>()
        }
    };

    Ok(ExecResult {
        rows_affected: rows.len() as u64,
        rows,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

/// Run one mutating statement and report affected rows (no row set).
pub(crate) async fn execute(pool: &DbPool, sql: &str, params: &[Param]) -> DbResult<ExecResult> {
    let start = Instant::now();
    let outcome = execute_inner(pool, sql, params, start).await;
    observe(sql, start, &outcome);
    outcome
}

async fn execute_inner(
    pool: &DbPool,
    sql: &str,
    params: &[Param],
    start: Instant,
) -> DbResult<ExecResult> {
    let rows_affected = match pool {
        DbPool::Postgres(p) => {
            if params.is_empty() {
                use sqlx::Executor;
                p.execute(sql).await.map_err(DbError::from)?.rows_affected()
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_pg_param(query, param);
                }
                query.execute(p).await.map_err(DbError::from)?.rows_affected()
            }
        }
        DbPool::Sqlite(p) => {
            if params.is_empty() {
                use sqlx::Executor;
                p.execute(sql).await.map_err(DbError::from)?.rows_affected()
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query.execute(p).await.map_err(DbError::from)?.rows_affected()
            }
        }
    };

    Ok(ExecResult {
        rows: Vec::new(),
        rows_affected,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}
