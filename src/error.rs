//! Error types for senvar operations.

use thiserror::Error;

/// Result type alias using [`SenvarError`].
pub type Result<T> = std::result::Result<T, SenvarError>;

/// Errors that can occur while synchronizing variables with a backend.
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
#[derive(Debug, Error)]
pub enum SenvarError {
    /// App/stage could not be resolved, or a variable name is malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend refused to create a duplicate entry.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The backend has no entry under this name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered successfully but carried no value.
    #[error("{0} is empty or missing a value")]
    EmptyValue(String),

    /// Any other backend failure (throttling, network, validation, ...).
    #[error("backend error: {0}")]
    Backend(String),

    /// Backend operation failed with context.
    #[error("{backend}: {operation} {item}: {source}")]
    BackendOperation {
        /// Backend name
        backend: String,
        /// Operation name (create, put, get, delete, list, ...)
        operation: String,
        /// Fully-qualified variable name or listing prefix
        item: String,
        /// Underlying error
        #[source]
        source: Box<SenvarError>,
    },

    /// Rotation script exited unsuccessfully or produced no value.
    #[error("command execution failed: {0}")]
    CommandFailed(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SenvarError {
    /// Creates a backend operation error with context.
    ///
    /// # Example
    ///
    /// ```
    /// use senvar::SenvarError;
    ///
    /// let err = SenvarError::NotFound("/senvar/shop/prod/dbPassword".to_string());
    /// let wrapped = SenvarError::backend_op(
    ///     "secretsmanager",
    ///     "get",
    ///     "/senvar/shop/prod/dbPassword",
    ///     err,
    /// );
    ///
    /// assert_eq!(
    ///     wrapped.to_string(),
    ///     "secretsmanager: get /senvar/shop/prod/dbPassword: \
    ///      not found: /senvar/shop/prod/dbPassword"
    /// );
    /// ```
    pub fn backend_op(
        backend: impl Into<String>,
        operation: impl Into<String>,
        item: impl Into<String>,
        err: SenvarError,
    ) -> Self {
        Self::BackendOperation {
            backend: backend.into(),
            operation: operation.into(),
            item: item.into(),
            source: Box::new(err),
        }
    }

    /// Returns the innermost error, skipping any operation context.
    pub fn root(&self) -> &SenvarError {
        match self {
            Self::BackendOperation { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the backend reported a duplicate-creation condition.
    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), Self::AlreadyExists(_))
    }

    /// True when the backend reported a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// True for failures worth retrying: everything the backend reported
    /// that is not one of the semantic conditions above.
    pub fn is_transient(&self) -> bool {
        matches!(self.root(), Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = SenvarError::EmptyValue("/senvar/a/b/c".to_string());
        assert_eq!(err.to_string(), "/senvar/a/b/c is empty or missing a value");
    }

    #[test]
    fn test_backend_operation_error() {
        let inner = SenvarError::Backend("ThrottlingException".to_string());
        let err = SenvarError::backend_op("ssm", "put", "/senvar/a/b/c", inner);

        let error_string = err.to_string();
        assert!(error_string.contains("ssm"));
        assert!(error_string.contains("put"));
        assert!(error_string.contains("ThrottlingException"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_classification_sees_through_context() {
        let err = SenvarError::backend_op(
            "secretsmanager",
            "create",
            "x",
            SenvarError::AlreadyExists("x".to_string()),
        );
        assert!(err.is_already_exists());
        assert!(!err.is_transient());

        let err = SenvarError::backend_op("ssm", "get", "x", SenvarError::NotFound("x".into()));
        assert!(err.is_not_found());

        assert!(SenvarError::Backend("timeout".into()).is_transient());
        assert!(!SenvarError::Configuration("app".into()).is_transient());
    }
}
