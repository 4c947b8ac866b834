//! # Storage Errors
//!
//! The failure vocabulary shared by every backend. Callers branch on
//! [`StorageError::kind`], never on the message text.

use std::fmt;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Kind of a storage failure, stable across backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backing medium failed in an unexpected way
    InternalError,
    /// The namespace has never been created (or was deleted)
    NamespaceNotFound,
    /// The key is absent from the namespace
    IdNotFound,
    /// The structure backing a namespace could not be created
    UnableToCreateNamespace,
    /// A filesystem operation failed
    FilesystemError,
}

impl ErrorKind {
    /// Numeric code, stable across releases
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::InternalError => 0,
            ErrorKind::NamespaceNotFound => 1,
            ErrorKind::IdNotFound => 2,
            ErrorKind::UnableToCreateNamespace => 3,
            ErrorKind::FilesystemError => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::NamespaceNotFound => "NAMESPACE_NOT_FOUND",
            ErrorKind::IdNotFound => "ID_NOT_FOUND",
            ErrorKind::UnableToCreateNamespace => "UNABLE_TO_CREATE_NAMESPACE",
            ErrorKind::FilesystemError => "FILESYSTEM_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("namespace {0} does not exist")]
    NamespaceNotFound(String),

    #[error("value not found in namespace {namespace} for key {key}")]
    IdNotFound { namespace: String, key: String },

    #[error("unable to create namespace {namespace}: {reason}")]
    UnableToCreateNamespace { namespace: String, reason: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl StorageError {
    pub fn id_not_found(namespace: &str, key: &str) -> Self {
        StorageError::IdNotFound {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    pub fn namespace_not_found(namespace: &str) -> Self {
        StorageError::NamespaceNotFound(namespace.to_string())
    }

    pub fn unable_to_create(namespace: &str, reason: impl fmt::Display) -> Self {
        StorageError::UnableToCreateNamespace {
            namespace: namespace.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Internal(_) => ErrorKind::InternalError,
            StorageError::NamespaceNotFound(_) => ErrorKind::NamespaceNotFound,
            StorageError::IdNotFound { .. } => ErrorKind::IdNotFound,
            StorageError::UnableToCreateNamespace { .. } => ErrorKind::UnableToCreateNamespace,
            StorageError::Filesystem(_) => ErrorKind::FilesystemError,
        }
    }

    /// True for the two "absent" kinds
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NamespaceNotFound | ErrorKind::IdNotFound
        )
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NamespaceNotFound => 404,
            ErrorKind::IdNotFound => 404,
            ErrorKind::InternalError => 500,
            ErrorKind::UnableToCreateNamespace => 500,
            ErrorKind::FilesystemError => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        let err = StorageError::id_not_found("users", "42");
        assert_eq!(err.kind(), ErrorKind::IdNotFound);
        assert_eq!(err.kind().code(), 2);
        assert!(err.is_not_found());

        let err = StorageError::unable_to_create("users", "disk full");
        assert_eq!(err.kind().code(), 3);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StorageError::namespace_not_found("a").status_code(), 404);
        assert_eq!(StorageError::id_not_found("a", "b").status_code(), 404);
        assert_eq!(StorageError::Internal("x".into()).status_code(), 500);
        assert_eq!(StorageError::Filesystem("x".into()).status_code(), 500);
    }

    #[test]
    fn test_messages() {
        let err = StorageError::id_not_found("users", "42");
        assert_eq!(
            err.to_string(),
            "value not found in namespace users for key 42"
        );
        assert_eq!(ErrorKind::NamespaceNotFound.to_string(), "NAMESPACE_NOT_FOUND");
    }
}
