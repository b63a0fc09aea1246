//! Store error types
//!
//! A missing record is not an error at this layer: lookups return
//! `Ok(None)` and the handler layer decides what that means. Errors here
//! are either the caller's fault (a malformed id, a duplicate, a document
//! that fails validation) or the store's (connectivity, timeouts).
//!
//! # Example
//!
//! ```rust
//! use tourbook_service::store::{StoreError, StoreErrorKind, StoreOperation};
//!
//! let error = StoreError::invalid_id(StoreOperation::FindById, "tours", "not-an-id");
//! assert!(matches!(error.kind, StoreErrorKind::InvalidId { .. }));
//! assert!(error.is_client_error());
//! ```

use std::fmt;

use super::schema::CastFailure;

/// Store operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Find,
    FindById,
    Create,
    FindByIdAndUpdate,
    FindByIdAndDelete,
    Import,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FindById => write!(f, "find_by_id"),
            Self::Create => write!(f, "create"),
            Self::FindByIdAndUpdate => write!(f, "find_by_id_and_update"),
            Self::FindByIdAndDelete => write!(f, "find_by_id_and_delete"),
            Self::Import => write!(f, "import"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// A value could not be cast to the type of `path`: a malformed id or
    /// a filter value of the wrong kind
    InvalidId { path: String, value: String },

    /// A unique index rejected the write
    Duplicate { fields: Vec<String>, value: String },

    /// Schema validation failed; one message per failing field
    ValidationFailed(Vec<String>),

    ConnectionFailed,

    Timeout,

    /// Stored data could not be (de)serialized
    Serialization,

    Other,
}

impl StoreErrorKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidId { .. } => "invalid_id",
            Self::Duplicate { .. } => "duplicate",
            Self::ValidationFailed(_) => "validation_failed",
            Self::ConnectionFailed => "connection_failed",
            Self::Timeout => "timeout",
            Self::Serialization => "serialization_error",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`DocumentStore`](super::DocumentStore)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub operation: StoreOperation,
    pub kind: StoreErrorKind,
    pub message: String,
    pub collection: Option<String>,
    pub document_id: Option<String>,
}

impl StoreError {
    pub fn new(operation: StoreOperation, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            collection: None,
            document_id: None,
        }
    }

    /// `id` is not a well-formed document identifier
    pub fn invalid_id(
        operation: StoreOperation,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            operation,
            kind: StoreErrorKind::InvalidId {
                path: "_id".to_string(),
                value: id.clone(),
            },
            message: format!("Cast to ObjectId failed for value \"{id}\" at path \"_id\""),
            collection: Some(collection.into()),
            document_id: Some(id),
        }
    }

    /// A filter value does not fit the kind of the field it constrains
    pub fn cast_failed(
        operation: StoreOperation,
        collection: impl Into<String>,
        failure: CastFailure,
    ) -> Self {
        Self {
            operation,
            message: format!(
                "Cast to {} failed for value \"{}\" at path \"{}\"",
                failure.kind.name(),
                failure.value, failure.path
            ),
            kind: StoreErrorKind::InvalidId {
                path: failure.path,
                value: failure.value,
            },
            collection: Some(collection.into()),
            document_id: None,
        }
    }

    pub fn duplicate(
        operation: StoreOperation,
        collection: impl Into<String>,
        fields: Vec<String>,
        value: impl Into<String>,
    ) -> Self {
        let value = value.into();
        Self {
            operation,
            message: format!("duplicate key on ({}): {value}", fields.join(", ")),
            kind: StoreErrorKind::Duplicate { fields, value },
            collection: Some(collection.into()),
            document_id: None,
        }
    }

    pub fn validation_failed(
        operation: StoreOperation,
        collection: impl Into<String>,
        messages: Vec<String>,
    ) -> Self {
        Self {
            operation,
            message: messages.join(". "),
            kind: StoreErrorKind::ValidationFailed(messages),
            collection: Some(collection.into()),
            document_id: None,
        }
    }

    pub fn connection_failed(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::ConnectionFailed, message)
    }

    pub fn timeout(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Timeout, message)
    }

    pub fn serialization(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Serialization, message)
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    #[must_use]
    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    /// Caused by the request rather than by the store
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::InvalidId { .. }
                | StoreErrorKind::Duplicate { .. }
                | StoreErrorKind::ValidationFailed(_)
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::ConnectionFailed | StoreErrorKind::Timeout
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        match (&self.collection, &self.document_id) {
            (Some(collection), Some(id)) => write!(f, " [{collection}: {id}]"),
            (Some(collection), None) => write!(f, " [{collection}]"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for StoreError {}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_id() {
        let error = StoreError::invalid_id(StoreOperation::FindById, "tours", "abc");
        assert_eq!(
            error.kind,
            StoreErrorKind::InvalidId {
                path: "_id".into(),
                value: "abc".into()
            }
        );
        assert_eq!(error.document_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_cast_failure_names_the_field() {
        let error = StoreError::cast_failed(
            StoreOperation::Find,
            "tours",
            CastFailure {
                path: "price".into(),
                value: "abc".into(),
                kind: crate::store::FieldKind::Number,
            },
        );
        assert_eq!(
            error.kind,
            StoreErrorKind::InvalidId { path: "price".into(), value: "abc".into() }
        );
        assert_eq!(error.message, "Cast to Number failed for value \"abc\" at path \"price\"");
        assert!(error.is_client_error());
        assert!(error.document_id.is_none());
    }

    #[test]
    fn test_validation_message_joins() {
        let error = StoreError::validation_failed(
            StoreOperation::Create,
            "tours",
            vec!["A tour must have a name".into(), "Price must have a value".into()],
        );
        assert_eq!(error.message, "A tour must have a name. Price must have a value");
        assert!(error.is_client_error());
        assert!(!error.is_retriable());
    }

    #[test]
    fn test_infrastructure_kinds() {
        let error = StoreError::connection_failed(StoreOperation::Find, "socket closed");
        assert!(error.is_retriable());
        assert!(!error.is_client_error());
        assert!(!StoreError::serialization(StoreOperation::Find, "bad").is_retriable());
    }

    #[test]
    fn test_display() {
        let error = StoreError::timeout(StoreOperation::Create, "deadline exceeded")
            .with_collection("reviews");
        assert_eq!(
            error.to_string(),
            "Store timeout error during create: deadline exceeded [reviews]"
        );
    }
}
