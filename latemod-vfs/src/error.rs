//! Store error types

use std::fmt;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for store operations
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// File or directory not found
    NotFound { path: String },

    /// Permission denied
    PermissionDenied { path: String },

    /// Invalid path
    InvalidPath { path: String, reason: String },

    /// Store is read-only (archive backends)
    ReadOnly { path: String },

    /// IO error
    Io { message: String },

    /// Custom error message
    Custom { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { path } => write!(f, "Path not found: {}", path),
            StoreError::PermissionDenied { path } => write!(f, "Permission denied: {}", path),
            StoreError::InvalidPath { path, reason } => {
                write!(f, "Invalid path '{}': {}", path, reason)
            }
            StoreError::ReadOnly { path } => write!(f, "Store is read-only: {}", path),
            StoreError::Io { message } => write!(f, "IO error: {}", message),
            StoreError::Custom { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StoreError::NotFound {
            path: "/a.mod".to_string(),
        };
        assert_eq!(format!("{}", err), "Path not found: /a.mod");

        let err = StoreError::ReadOnly {
            path: "bundle.lpk".to_string(),
        };
        assert_eq!(format!("{}", err), "Store is read-only: bundle.lpk");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
