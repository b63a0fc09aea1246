//! Service-level error types
//!
//! These cover startup and infrastructure failures: configuration, I/O,
//! seeding and serving. Request-level failures are
//! [`ApiError`](crate::handlers::ApiError)s.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for service startup and operation
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// An explicitly requested configuration file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Document store error
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Seed data could not be read or parsed
    #[error("Seed error in {}: {message}", path.display())]
    Seed { path: PathBuf, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server failed to bind or stopped unexpectedly
    #[error("Server error: {0}")]
    Server(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    pub fn seed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Seed {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOperation;

    #[test]
    fn test_seed_error_names_file() {
        let err = Error::seed("data/tours.json", "expected an array");
        assert_eq!(err.to_string(), "Seed error in data/tours.json: expected an array");
    }

    #[test]
    fn test_store_error_passes_through() {
        let store = StoreError::connection_failed(StoreOperation::Import, "down").with_collection("tours");
        let err: Error = store.clone().into();
        assert_eq!(err.to_string(), store.to_string());
    }
}
