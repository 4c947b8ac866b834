//! Query error types

use thiserror::Error;

use crate::storage::StorageError;

/// Failure compiling or running a filter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The filter text is not a valid program
    #[error("syntax error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// The filter failed on a particular input
    #[error("{0}")]
    Runtime(String),
}

impl QueryError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        QueryError::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        QueryError::Runtime(message.into())
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, QueryError::Parse { .. })
    }
}

/// Result type for filter compilation and evaluation
pub type QueryResult<T> = Result<T, QueryError>;

/// Failure searching a namespace
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Filter(#[from] QueryError),

    /// A stored document is not valid JSON
    #[error("malformed document at key {key}: {reason}")]
    MalformedDocument { key: String, reason: String },
}

impl SearchError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            SearchError::Storage(e) => e.status_code(),
            SearchError::Filter(QueryError::Parse { .. }) => 400,
            SearchError::Filter(QueryError::Runtime(_)) => 500,
            SearchError::MalformedDocument { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_status_codes() {
        assert_eq!(SearchError::from(QueryError::parse(0, "x")).status_code(), 400);
        assert_eq!(SearchError::from(QueryError::runtime("x")).status_code(), 500);
        assert_eq!(
            SearchError::from(StorageError::namespace_not_found("ns")).status_code(),
            404
        );
    }
}
