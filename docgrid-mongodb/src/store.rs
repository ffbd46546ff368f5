use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, ReturnDocument},
};
use std::time::Duration;
use tracing::debug;

use docgrid_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{DocumentId, ID_KEY},
    error::{DocumentStoreError, DocumentStoreResult},
    path::FieldPath,
    query::{Expr, Query},
};

use crate::query::MongoQueryTranslator;

/// Environment variable holding the connection string used by [`MongoDbStoreBuilder::from_env`].
pub const URI_ENV: &str = "MONGO_URI";

/// Connection string used when [`URI_ENV`] is unset.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017/book_database";

const DUPLICATE_KEY: i32 = 11000;

/// Maps a driver error onto the store error vocabulary.
///
/// Failures to reach the cluster become [`DocumentStoreError::Unavailable`] and socket
/// timeouts become [`DocumentStoreError::Timeout`], so callers can tell them apart from
/// errors the server returned for a specific operation.
pub fn map_mongo_error(err: MongoError) -> DocumentStoreError {
    match err.kind.as_ref() {
        ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => DocumentStoreError::Timeout(err.to_string()),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            DocumentStoreError::Unavailable(err.to_string())
        }
        _ => DocumentStoreError::Backend(err.to_string()),
    }
}

/// MongoDB reads a negative limit as a single-batch cap, so oversized limits saturate.
fn page_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

/// MongoDB-backed document store.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn).database(database)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let filter = MongoQueryTranslator::filter(query.filter.as_ref())?;

        let mut options = FindOptions::default();
        options.sort = MongoQueryTranslator::sort(&query.sort);
        options.skip = query.offset.map(|offset| u64::try_from(offset).unwrap_or(u64::MAX));
        options.limit = query.limit.map(page_limit);

        debug!(collection, %filter, "mongodb find");

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(map_mongo_error)?
            .try_collect()
            .await
            .map_err(map_mongo_error)
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator::filter(filter.as_ref())?;

        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(map_mongo_error)
    }

    async fn insert_document(&self, id: DocumentId, document: Document, collection: &str) -> DocumentStoreResult<()> {
        let mut stored = doc! { ID_KEY: id.to_bson() };
        for (key, value) in document {
            if key != ID_KEY {
                stored.insert(key, value);
            }
        }

        self.get_collection(collection)
            .insert_one(stored)
            .await
            .map_err(|e| match is_duplicate_key(&e) {
                true => DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()),
                false => map_mongo_error(e),
            })?;

        Ok(())
    }

    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let set: Document = sets
            .into_iter()
            .map(|(path, value)| (path.to_dotted(), value))
            .collect();

        self.get_collection(collection)
            .find_one_and_update(doc! { ID_KEY: id.to_bson() }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_mongo_error)
    }

    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(doc! { ID_KEY: id.to_bson() })
            .await
            .map_err(map_mongo_error)?
            .deleted_count)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`].
///
/// The database defaults to the one named in the connection string's path.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: None,
            connect_timeout: None,
            server_selection_timeout: None,
        }
    }

    /// Reads the connection string from `MONGO_URI`, falling back to [`DEFAULT_URI`].
    pub fn from_env() -> Self {
        Self::new(&std::env::var(URI_ENV).unwrap_or_else(|_| DEFAULT_URI.to_string()))
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Bounds how long an operation waits for a reachable server before failing as unavailable.
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if self.connect_timeout.is_some() {
            options.connect_timeout = self.connect_timeout;
        }
        if self.server_selection_timeout.is_some() {
            options.server_selection_timeout = self.server_selection_timeout;
        }

        let database = self
            .database
            .or_else(|| options.default_database.clone())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DocumentStoreError::Initialization("no database named in builder or connection string".into()))?;

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        debug!(database = %database, "mongodb client ready");

        Ok(MongoDbStore::new(client, database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_settings() {
        let builder = MongoDbStore::builder("mongodb://db:27017", "books")
            .connect_timeout(Duration::from_secs(2))
            .server_selection_timeout(Duration::from_secs(3));

        assert_eq!(builder.dsn, "mongodb://db:27017");
        assert_eq!(builder.database.as_deref(), Some("books"));
        assert_eq!(builder.connect_timeout, Some(Duration::from_secs(2)));
        assert_eq!(builder.server_selection_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn page_limits_never_turn_negative() {
        assert_eq!(page_limit(25), 25);
        assert_eq!(page_limit(usize::MAX), i64::MAX);
    }

    #[tokio::test]
    async fn database_comes_from_the_connection_string() {
        // Client construction does not connect, so no server is needed.
        let store = MongoDbStoreBuilder::new(DEFAULT_URI).build().await.unwrap();

        assert_eq!(store.database(), "book_database");
    }

    #[tokio::test]
    async fn missing_database_fails_to_build() {
        let err = MongoDbStoreBuilder::new("mongodb://localhost:27017").build().await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
    }
}
