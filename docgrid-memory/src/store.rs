//! In-memory storage implementation for grid stores.
//!
//! Documents live in ordered maps keyed by [`DocumentId`], guarded by an async-aware
//! read-write lock. Every write takes the lock for the whole operation, which makes
//! single-document updates and deletes atomic with respect to each other.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::trace;

use docgrid_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{DocumentId, ID_KEY},
    error::{DocumentStoreError, DocumentStoreResult},
    path::FieldPath,
    query::{Expr, Query},
};

use crate::evaluator::{DocumentEvaluator, sort_documents};

type CollectionMap = BTreeMap<DocumentId, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones
/// share the same documents.
///
/// # Ordering
///
/// Without sort keys, documents come back in id order. That order is stable but is not
/// insertion order.
///
/// # Performance
///
/// Queries scan every document of the collection. Fine for tests, demos and small grids.
///
/// # Example
///
/// ```ignore
/// use docgrid_memory::InMemoryStore;
/// use docgrid_core::{backend::StoreBackend, document::DocumentId};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_document(DocumentId::generate(), doc! { "Title": "Dune" }, "books").await?;
/// assert_eq!(store.count_documents(None, "books").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Loads documents into `collection`, keeping their `_id` or assigning a fresh one.
    ///
    /// Returns the ids in input order. Meant for seeding demo and test data.
    pub async fn seed(
        &self,
        collection: &str,
        documents: impl IntoIterator<Item = Document>,
    ) -> DocumentStoreResult<Vec<DocumentId>> {
        let mut ids = Vec::new();

        for document in documents {
            let id = match document.get(ID_KEY) {
                Some(value) => DocumentId::from_bson(value).ok_or_else(|| {
                    DocumentStoreError::InvalidDocument(format!("unsupported {ID_KEY} {value}"))
                })?,
                None => DocumentId::generate(),
            };

            self.insert_document(id.clone(), document, collection).await?;
            ids.push(id);
        }

        Ok(ids)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = DocumentEvaluator::filter_documents(collection_map.values(), query.filter.as_ref())?;
        drop(store);

        sort_documents(&mut documents, &query.sort);

        trace!(collection, matched = documents.len(), "in-memory query");

        Ok(documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(0);
        };

        let count = match &filter {
            Some(_) => DocumentEvaluator::filter_documents(collection_map.values(), filter.as_ref())?.len(),
            None => collection_map.len(),
        };

        Ok(count as u64)
    }

    async fn insert_document(&self, id: DocumentId, document: Document, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if collection_map.contains_key(&id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
        }

        let mut stored = Document::new();
        stored.insert(ID_KEY, id.to_bson());
        for (key, value) in document {
            if key != ID_KEY {
                stored.insert(key, value);
            }
        }

        collection_map.insert(id, stored);

        Ok(())
    }

    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut store = self.store.write().await;
        let Some(document) = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(&id))
        else {
            return Ok(None);
        };

        // Apply to a copy so a failing path leaves the stored document untouched.
        let mut updated = document.clone();
        for (path, value) in sets {
            path.assign(&mut updated, value)
                .map_err(|e| DocumentStoreError::InvalidDocument(e.to_string()))?;
        }

        *document = updated.clone();

        Ok(Some(updated))
    }

    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;

        let removed = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.remove(&id))
            .is_some();

        Ok(u64::from(removed))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Adds documents to load into `collection` when the store is built.
    pub fn with_documents(mut self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seed.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (collection, documents) in self.seed {
            store.seed(&collection, documents).await?;
        }

        Ok(store)
    }
}
