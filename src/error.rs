//! Error types for the data access layer.
//!
//! Four kinds matter to callers: `Validation` (a precondition was violated
//! before any statement was sent), `PoolTimeout` (no connection became
//! available within the acquire timeout), `Driver` (the database rejected or
//! failed a statement), and `Transaction` (a commit failed after the
//! statements themselves succeeded). `Connection` covers pool creation and
//! reachability failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("No connection became available before the acquire timeout elapsed")]
    PoolTimeout,

    #[error("Driver error: {message}")]
    Driver {
        message: String,
        /// e.g. "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String },
}

impl DbError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a driver error with optional SQLSTATE code.
    pub fn driver(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Driver {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a transaction error wrapping the triggering failure.
    pub fn transaction(message: impl Into<String>, source: DbError) -> Self {
        Self::Transaction {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Get the SQLSTATE code, if the database reported one.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Driver { sql_state, .. } => sql_state.as_deref(),
            Self::Transaction { source, .. } => source.sql_state(),
            _ => None,
        }
    }

    /// Check if this error may succeed on retry. Validation and driver
    /// errors never will; the statement itself is at fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolTimeout | Self::Connection { .. })
    }
}

/// Convert sqlx errors into the layer's taxonomy. Pool exhaustion stays
/// distinct from statement failures so callers can tell them apart.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DbError::PoolTimeout,
            sqlx::Error::PoolClosed => DbError::connection("Connection pool is closed"),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::driver(db_err.message(), code)
            }
            sqlx::Error::Configuration(msg) => {
                DbError::connection(format!("Invalid configuration: {}", msg))
            }
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("Protocol error: {}", msg)),
            other => DbError::driver(other.to_string(), None),
        }
    }
}

/// Result type alias for data access operations.
pub type DbResult<T> = Result<T, DbError>;
