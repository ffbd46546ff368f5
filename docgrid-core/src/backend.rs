//! Storage backend abstraction for the grid bridge.
//!
//! This module defines the seam between the grid/editor engines and a concrete document
//! store. A backend only has to offer the handful of single-collection operations the
//! bridge needs: a filtered, sorted and windowed query, a filtered count, and single
//! document insert, targeted update and delete.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docgrid_core::{backend::StoreBackend, document::DocumentId};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = DocumentId::generate();
//! backend.insert_document(id.clone(), doc! { "Title": "Dune" }, "books").await?;
//! assert_eq!(backend.delete_document(id, "books").await?, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{any::Any, fmt::Debug};

use crate::{
    document::DocumentId,
    error::DocumentStoreResult,
    path::FieldPath,
    query::{Expr, Query},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The exact concurrency model is implementation-specific but should be
/// documented by the implementer.
///
/// # Atomicity
///
/// [`update_fields`](Self::update_fields) and [`delete_document`](Self::delete_document)
/// name a single identifier and must be atomic with respect to concurrent writers to that
/// document: a concurrent update and delete resolve to one of them winning while the other
/// observes zero matched documents.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Connection failures should be reported as
/// [`Unavailable`](crate::error::DocumentStoreError::Unavailable) and driver-side deadlines
/// as [`Timeout`](crate::error::DocumentStoreError::Timeout) so callers can tell them apart.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Queries documents in a collection using a structured query.
    ///
    /// Applies the filter, then the sort keys in order, then skips `offset` documents and
    /// returns at most `limit` of the rest. A missing collection holds no documents.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Counts the documents matching `filter`, or every document when `filter` is `None`.
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Inserts one document under `id`. The document's `_id` key is set to `id`.
    ///
    /// Returns [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if the id is taken.
    async fn insert_document(
        &self,
        id: DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Sets each `(path, value)` pair on the document with `id` in one atomic operation.
    ///
    /// Only the addressed paths change; sibling keys under the same parent are preserved.
    /// Returns the document as it is after the update, or `None` if no document matched.
    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Deletes the document with `id`, returning the number of documents removed (0 or 1).
    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, backends holding connections should
    /// override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .query_documents(query, collection)
            .await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        (*self)
            .count_documents(filter, collection)
            .await
    }

    async fn insert_document(
        &self,
        id: DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        (*self)
            .insert_document(id, document, collection)
            .await
    }

    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self)
            .update_fields(id, sets, collection)
            .await
    }

    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64> {
        (*self)
            .delete_document(id, collection)
            .await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;
    async fn insert_document(
        &self,
        id: DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn insert_document(
        &self,
        id: DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::insert_document(self, id, document, collection).await
    }

    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::update_fields(self, id, sets, collection).await
    }

    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_document(self, id, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        (*self).shutdown().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

}

/// Lets a runtime-selected backend drive the same engines as a concrete one.
#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self)
            .query_documents(query, collection)
            .await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        (**self)
            .count_documents(filter, collection)
            .await
    }

    async fn insert_document(
        &self,
        id: DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        (**self)
            .insert_document(id, document, collection)
            .await
    }

    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self)
            .update_fields(id, sets, collection)
            .await
    }

    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64> {
        (**self)
            .delete_document(id, collection)
            .await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        DynStoreBackend::shutdown_boxed(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
