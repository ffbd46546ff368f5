//! A named collection bound to a backend, with a deadline on every store call.
//!
//! The grid and editor engines never talk to a [`StoreBackend`] directly. They go through
//! a [`Collection`], which fixes the collection name and wraps each call in
//! [`tokio::time::timeout`]. A call that outlives the deadline is abandoned and reported
//! as [`DocumentStoreError::Timeout`]. It is not retried.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use docgrid_core::collection::Collection;
//!
//! let books = Collection::new("books", &backend).with_timeout(Some(Duration::from_secs(5)));
//! let total = books.count(None).await?;
//! ```

use bson::{Bson, Document};
use std::{future::Future, time::Duration};

use crate::{
    backend::StoreBackend,
    document::DocumentId,
    error::{DocumentStoreError, DocumentStoreResult},
    path::FieldPath,
    query::{Expr, Query},
};

/// A collection handle over a borrowed backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    timeout: Option<Duration>,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Creates a collection handle with no deadline.
    pub fn new(name: impl Into<String>, backend: &'a B) -> Self {
        Self { name: name.into(), backend, timeout: None }
    }

    /// Sets the deadline applied to each store call. `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> DocumentStoreResult<T>
    where
        F: Future<Output = DocumentStoreResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| {
                    DocumentStoreError::Timeout(format!(
                        "{operation} on {} exceeded {}ms",
                        self.name,
                        limit.as_millis()
                    ))
                })?,
            None => call.await,
        }
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<Document>> {
        self.bounded("query", self.backend.query_documents(query, &self.name))
            .await
    }

    /// Counts documents matching `filter`, or all documents for `None`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.bounded("count", self.backend.count_documents(filter, &self.name))
            .await
    }

    /// Inserts one document under `id`.
    pub async fn insert(&self, id: DocumentId, document: Document) -> DocumentStoreResult<()> {
        self.bounded("insert", self.backend.insert_document(id, document, &self.name))
            .await
    }

    /// Applies the field sets to one document, returning its post-update state.
    pub async fn update(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.bounded("update", self.backend.update_fields(id, sets, &self.name))
            .await
    }

    /// Deletes one document, returning the number removed.
    pub async fn delete(&self, id: DocumentId) -> DocumentStoreResult<u64> {
        self.bounded("delete", self.backend.delete_document(id, &self.name))
            .await
    }
}
