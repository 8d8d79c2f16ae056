//! Database layer: pooling, statement building, execution, introspection,
//! and transactions.

pub mod builder;
pub mod dao;
pub mod executor;
pub mod params;
pub mod pool;
pub mod schema;
pub mod transaction;
pub mod types;

pub use builder::SelectOptions;
pub use dao::{BatchUpdate, Dao};
pub use executor::ExecResult;
pub use params::Param;
pub use pool::{DbPool, ServerInfo};
pub use schema::ColumnInfo;
pub use transaction::TxScope;
pub use types::JsonMap;
