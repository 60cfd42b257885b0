//! Error types for lazyorm

use std::time::Duration;
use thiserror::Error;

/// Result type alias for lazyorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Bad identifier, operator or argument. Always raised before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend rejected the statement (syntax, constraint, type mismatch).
    #[error("Query error: {message}")]
    Query {
        message: String,
        /// SQLSTATE reported by the server, when there is one.
        sqlstate: Option<String>,
    },

    /// No connection could be obtained (pool unavailable, connect failure).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The pool had no free connection within the wait timeout.
    #[error("Connection pool exhausted after waiting {0:?}")]
    PoolExhausted(Duration),

    /// A result row could not be mapped onto the record shape.
    #[error("Data mapping error on field '{field}': {message}")]
    DataMapping { field: String, message: String },

    /// Invalid pool or loader configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The CSV source could not be read or parsed.
    #[error("CSV error: {0}")]
    Csv(String),
}

impl OrmError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a query error without a SQLSTATE
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sqlstate: None,
        }
    }

    /// Create a data mapping error for a specific field
    pub fn mapping(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataMapping {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// `PoolExhausted` is a specialization of a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::PoolExhausted(_))
    }

    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted(_))
    }

    pub fn is_data_mapping(&self) -> bool {
        matches!(self, Self::DataMapping { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// SQLSTATE of a backend error, if known.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Query { sqlstate, .. } => sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Translate a tokio_postgres error, keeping the server message for diagnostics.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = match db_err.constraint() {
                Some(constraint) => format!("{} ({constraint})", db_err.message()),
                None => db_err.message().to_string(),
            };
            return Self::Query {
                message,
                sqlstate: Some(db_err.code().code().to_string()),
            };
        }
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::query(err.to_string())
    }
}

impl From<csv::Error> for OrmError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        use deadpool_postgres::PoolError;
        match err {
            // The configured wait duration is not carried by the error itself.
            PoolError::Timeout(_) => Self::PoolExhausted(Duration::ZERO),
            PoolError::Backend(e) => Self::from_db_error(e),
            other => Self::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhausted_is_a_connection_error() {
        let err = OrmError::PoolExhausted(Duration::from_secs(5));
        assert!(err.is_connection());
        assert!(err.is_pool_exhausted());
        assert!(!OrmError::Connection("down".into()).is_pool_exhausted());
    }

    #[test]
    fn query_error_keeps_message_and_sqlstate() {
        let err = OrmError::Query {
            message: "duplicate key value violates unique constraint".into(),
            sqlstate: Some("23505".into()),
        };
        assert!(err.is_query());
        assert_eq!(err.sqlstate(), Some("23505"));
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn mapping_error_names_the_field() {
        let err = OrmError::mapping("age", "expected integer");
        assert_eq!(
            err.to_string(),
            "Data mapping error on field 'age': expected integer"
        );
    }
}
