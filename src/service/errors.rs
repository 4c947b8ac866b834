//! Service error types

use thiserror::Error;

use crate::query::SearchError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by [`DocumentService`](super::DocumentService)
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Namespace or key does not match `[a-zA-Z0-9]+`
    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Search(#[from] SearchError),

    /// A stored document could not be parsed for a listing
    #[error("malformed document at key {key}: {reason}")]
    MalformedDocument { key: String, reason: String },
}

impl ServiceError {
    /// HTTP status for this error. Invalid names are reported as not found,
    /// as no such path can exist.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidName(_) => 404,
            ServiceError::Storage(e) => e.status_code(),
            ServiceError::Schema(e) => e.status_code(),
            ServiceError::Search(e) => e.status_code(),
            ServiceError::MalformedDocument { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryError;

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::InvalidName("a-b".into()).status_code(), 404);
        assert_eq!(
            ServiceError::from(StorageError::id_not_found("a", "b")).status_code(),
            404
        );
        assert_eq!(
            ServiceError::from(SchemaError::MalformedJson("x".into())).status_code(),
            400
        );
        assert_eq!(
            ServiceError::from(SearchError::from(QueryError::runtime("x"))).status_code(),
            500
        );
    }
}
