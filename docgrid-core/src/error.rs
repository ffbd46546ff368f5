//! Error types and result types for grid and editor operations.
//!
//! Two layers of errors live here:
//!
//! - [`DocumentStoreError`] is what a [`StoreBackend`](crate::backend::StoreBackend)
//!   reports: serialization problems, missing documents, timeouts and transport failures.
//! - [`BridgeError`] is what the grid and editor engines report to the transport adapter.
//!   Store errors are folded into it through `From`, keeping timeouts, outages and
//!   missing documents distinguishable.
//!
//! Per-field problems (a value that cannot be coerced, an unknown field in strict mode,
//! a missing required field) are collected into [`FieldErrors`] so the caller can fix
//! every invalid field in one round trip.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::fmt;
use thiserror::Error;

use crate::coerce::CoercionError;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The store did not answer before the deadline.
    #[error("Store timed out: {0}")]
    Timeout(String),
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// Why a single submitted field was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldErrorReason {
    /// The value could not be converted to the field's declared type.
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    /// The field is not part of the schema and the schema is strict.
    #[error("Unknown field")]
    Unknown,
    /// A required field was not supplied on create.
    #[error("This field is required")]
    Missing,
    /// The key is not an addressable document path.
    #[error("Invalid field path: {0}")]
    InvalidPath(String),
    /// The field overlaps another submitted field (e.g. `a` and `a.b`).
    #[error("Conflicts with field {0}")]
    Conflict(String),
}

/// A rejected field, named the way the client submitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub reason: FieldErrorReason,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<FieldErrorReason>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every field error found while validating one action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Returns the error reported for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&FieldErrorReason> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| &error.reason)
    }

    /// Converts the collected errors into a result, failing if any were recorded.
    pub fn into_result(self) -> BridgeResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Fields(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        write!(f, "{}", rendered.join("; "))
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Errors surfaced by the grid and editor engines.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request is malformed or references a path outside the schema.
    #[error("Invalid request: {0}")]
    Validation(String),
    /// One or more submitted field values were rejected.
    #[error("Invalid field values: {0}")]
    Fields(FieldErrors),
    /// The targeted document does not exist.
    #[error("Document {0} not found")]
    NotFound(String),
    /// The store did not answer before the deadline.
    #[error("Store timed out: {0}")]
    StoreTimeout(String),
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// Any other store failure.
    #[error(transparent)]
    Store(DocumentStoreError),
}

/// A specialized `Result` type for grid and editor operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Returns true for errors caused by the request content rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, BridgeError::Validation(_) | BridgeError::Fields(_))
    }

    /// Returns the per-field errors when this is a field validation failure.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            BridgeError::Fields(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<DocumentStoreError> for BridgeError {
    fn from(err: DocumentStoreError) -> Self {
        match err {
            DocumentStoreError::Timeout(message) => BridgeError::StoreTimeout(message),
            DocumentStoreError::Unavailable(message) => BridgeError::StoreUnavailable(message),
            other => BridgeError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_bridge_taxonomy() {
        let timeout: BridgeError = DocumentStoreError::Timeout("find".into()).into();
        assert!(matches!(timeout, BridgeError::StoreTimeout(_)));

        let down: BridgeError = DocumentStoreError::Unavailable("no primary".into()).into();
        assert!(matches!(down, BridgeError::StoreUnavailable(_)));

        let other: BridgeError = DocumentStoreError::Backend("boom".into()).into();
        assert!(matches!(other, BridgeError::Store(_)));
        assert!(!other.is_validation());
    }

    #[test]
    fn field_errors_collect_and_render() {
        let mut errors = FieldErrors::new();
        errors.push(FieldError::new("Pages", CoercionError::InvalidNumber("many".into())));
        errors.push(FieldError::new("Title", FieldErrorReason::Missing));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("Title"), Some(&FieldErrorReason::Missing));
        assert!(errors.to_string().contains("Pages"));

        let err = errors.into_result().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field_errors().map(FieldErrors::len), Some(2));
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
