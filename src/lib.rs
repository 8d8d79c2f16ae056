//! dbkit - Pooled Relational Data Access
//!
//! A thin, typed layer over SQL databases (PostgreSQL, SQLite): a connection
//! pool, a parameterized query executor, JSON-shaped CRUD helpers built from
//! validated identifiers and positional placeholders, schema introspection,
//! and a scoped transaction API where commit and rollback are structurally
//! exhaustive.

pub mod config;
pub mod db;
pub mod error;

pub use config::{Backend, DbConfig, PoolSettings};
pub use db::{
    BatchUpdate, ColumnInfo, Dao, DbPool, ExecResult, JsonMap, Param, SelectOptions, ServerInfo,
    TxScope,
};
pub use error::{DbError, DbResult};
