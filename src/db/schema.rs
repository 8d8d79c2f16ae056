//! Schema introspection: table existence and column description.
//!
//! Queries go against the backend's system catalog; this layer never creates
//! or migrates the schemas it reads.

use crate::db::builder::check_ident;
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use serde::Serialize;
use sqlx::Row;
use tracing::debug;

/// Column metadata row, ordered by ordinal position.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// 1-based position within the table.
    pub ordinal: i32,
}

mod queries {
    pub mod postgres {
        pub const TABLE_EXISTS: &str = r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                column_name,
                data_type,
                is_nullable,
                column_default,
                ordinal_position
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#;
    }

    pub mod sqlite {
        pub const TABLE_EXISTS: &str = r#"
            SELECT EXISTS (
                SELECT 1 FROM sqlite_master
                WHERE type = 'table' AND name = $1
            )
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT name, type, "notnull", dflt_value, cid
            FROM pragma_table_info($1)
            ORDER BY cid
            "#;
    }
}

/// Check whether a table exists.
pub(crate) async fn table_exists(pool: &DbPool, table: &str) -> DbResult<bool> {
    check_ident(table)?;
    let exists = match pool {
        DbPool::Postgres(p) => sqlx::query_scalar::<_, bool>(queries::postgres::TABLE_EXISTS)
            .bind(table)
            .fetch_one(p)
            .await
            .map_err(DbError::from)?,
        DbPool::Sqlite(p) => {
            let n: i64 = sqlx::query_scalar(queries::sqlite::TABLE_EXISTS)
                .bind(table)
                .fetch_one(p)
                .await
                .map_err(DbError::from)?;
            n != 0
        }
    };
    debug!(table = %table, exists, "Checked table existence");
    Ok(exists)
}

/// Describe a table's columns, ordered by ordinal position. An unknown
/// table yields an empty list; pair with [`table_exists`] to distinguish
/// that from a zero-column table.
pub(crate) async fn describe_table(pool: &DbPool, table: &str) -> DbResult<Vec<ColumnInfo>> {
    check_ident(table)?;
    let columns = match pool {
        DbPool::Postgres(p) => {
            let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
                .bind(table)
                .fetch_all(p)
                .await
                .map_err(DbError::from)?;
            rows.iter()
                .map(|row| {
                    Ok(ColumnInfo {
                        name: row.try_get("column_name").map_err(DbError::from)?,
                        data_type: row.try_get("data_type").map_err(DbError::from)?,
                        nullable: row
                            .try_get::<String, _>("is_nullable")
                            .map_err(DbError::from)?
                            .eq_ignore_ascii_case("yes"),
                        default: row.try_get("column_default").map_err(DbError::from)?,
                        ordinal: row.try_get("ordinal_position").map_err(DbError::from)?,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?
        }
        DbPool::Sqlite(p) => {
            let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
                .bind(table)
                .fetch_all(p)
                .await
                .map_err(DbError::from)?;
            rows.iter()
                .map(|row| {
                    let notnull: i64 = row.try_get("notnull").map_err(DbError::from)?;
                    let cid: i64 = row.try_get("cid").map_err(DbError::from)?;
                    Ok(ColumnInfo {
                        name: row.try_get("name").map_err(DbError::from)?,
                        data_type: row.try_get("type").map_err(DbError::from)?,
                        nullable: notnull == 0,
                        default: row.try_get("dflt_value").map_err(DbError::from)?,
                        ordinal: cid as i32 + 1,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?
        }
    };
    debug!(table = %table, count = columns.len(), "Described table");
    Ok(columns)
}
