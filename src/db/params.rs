//! Positional statement parameters and per-backend binding.
//!
//! Placeholder/value correspondence is positional: the Nth `$n` placeholder
//! in a statement is bound to the Nth `Param` in the slice. The driver is
//! the enforcement point for count mismatches.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{Postgres, Sqlite};

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Structured value (arrays and objects)
    Json(JsonValue),
}

impl Param {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<&JsonValue> for Param {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Param::Null,
            JsonValue::Bool(b) => Param::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Param::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Param::Float(f)
                } else {
                    Param::String(n.to_string())
                }
            }
            JsonValue::String(s) => Param::String(s.clone()),
            other => Param::Json(other.clone()),
        }
    }
}

impl From<JsonValue> for Param {
    fn from(value: JsonValue) -> Self {
        Param::from(&value)
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_pg_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q Param,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        Param::Null => query.bind(None::<String>),
        Param::Bool(v) => query.bind(*v),
        Param::Int(v) => query.bind(*v),
        Param::Float(v) => query.bind(*v),
        Param::String(v) => query.bind(v.as_str()),
        Param::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q Param,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        Param::Null => query.bind(None::<String>),
        Param::Bool(v) => query.bind(*v),
        Param::Int(v) => query.bind(*v),
        Param::Float(v) => query.bind(*v),
        Param::String(v) => query.bind(v.as_str()),
        // SQLite has no native JSON type, store as string
        Param::Json(v) => query.bind(v.to_string()),
    }
}
