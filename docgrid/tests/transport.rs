mod common;

use async_trait::async_trait;
use bson::{Bson, Document};
use docgrid::{
    backend::{DynStoreBackend, StoreBackend},
    config::GridConfig,
    document::DocumentId,
    error::{DocumentStoreError, DocumentStoreResult},
    memory::InMemoryStore,
    path::FieldPath,
    query::{Expr, Query},
    store::GridStore,
    transport::{handle_editor, handle_grid},
};
use http::StatusCode;
use serde_json::json;
use std::time::Duration;

use common::{BOOKS, book_schema, books, init_tracing, seeded};

fn grid_body() -> serde_json::Value {
    json!({
        "draw": "4",
        "start": "0",
        "length": "2",
        "search": { "value": "", "regex": false },
        "columns": [
            { "data": "Title", "name": "", "searchable": true, "orderable": true, "search": { "value": "", "regex": false } },
            { "data": "Pages", "name": "", "searchable": true, "orderable": true, "search": { "value": "", "regex": false } },
        ],
        "order": [{ "column": 1, "dir": "desc" }],
    })
}

#[tokio::test]
async fn grid_reply_has_protocol_shape() {
    let (store, _, _) = seeded(false).await;

    let reply = handle_grid(&store, &grid_body()).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["draw"], json!(4));
    assert_eq!(reply.body["recordsTotal"], json!(3));
    assert_eq!(reply.body["recordsFiltered"], json!(3));
    assert_eq!(reply.body["data"][0]["Pages"], json!(450));
    assert_eq!(reply.body["data"][1]["Pages"], json!(300));
}

#[tokio::test]
async fn grid_rejects_unknown_columns_with_error_shape() {
    let (store, _, _) = seeded(false).await;
    let mut body = grid_body();
    body["columns"][1]["data"] = json!("Price");

    let reply = handle_grid(&store, &body).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["draw"], json!(4));
    assert_eq!(reply.body["data"], json!([]));
    assert_eq!(reply.body["recordsTotal"], json!(0));
    assert_eq!(reply.body["recordsFiltered"], json!(0));
    assert!(reply.body["error"].as_str().unwrap().contains("Price"));
}

#[tokio::test]
async fn unsearchable_columns_leave_global_search() {
    let (store, _, _) = seeded(false).await;
    let body = json!({
        "search": { "value": "quill" },
        "columns": [{ "data": "Author", "searchable": false }],
    });

    let reply = handle_grid(&store, &body).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["recordsFiltered"], json!(0));
}

#[tokio::test]
async fn editor_create_and_edit_round_trip() {
    let (store, _, _) = seeded(false).await;

    let created = handle_editor(
        &store,
        &json!({ "action": "create", "data": { "0": { "Title": "Salt Road", "Pages": "288" } } }),
        None,
    )
    .await;
    assert_eq!(created.status, StatusCode::OK);
    let row_id = created.body["data"][0]["DT_RowId"].as_str().unwrap().to_string();

    let edited = handle_editor(
        &store,
        &json!({ "action": "edit", "data": { row_id.clone(): { "Pages": 290 } } }),
        None,
    )
    .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["data"][0]["Pages"], json!(290));
    assert!(edited.body.get("error").is_none());

    let removed = handle_editor(&store, &json!({ "action": "remove" }), Some(row_id.as_str())).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body, json!({ "data": [] }));
}

#[tokio::test]
async fn editor_field_errors_follow_editor_convention() {
    let (store, _, ids) = seeded(false).await;

    let reply = handle_editor(
        &store,
        &json!({ "action": "edit", "data": { ids[0].to_string(): { "Pages": "many" } } }),
        None,
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["data"], json!([]));
    assert_eq!(reply.body["fieldErrors"][0]["name"], json!("Pages"));
    assert!(reply.body["fieldErrors"][0]["status"].is_string());
}

#[tokio::test]
async fn editor_partial_batch_answers_ok() {
    let (store, _, ids) = seeded(false).await;
    let missing = DocumentId::generate().to_string();

    let reply = handle_editor(
        &store,
        &json!({ "action": "remove", "data": { missing.clone(): {}, ids[1].to_string(): {} } }),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["error"].as_str().unwrap().contains(&missing));

    let reply = handle_editor(&store, &json!({ "action": "remove" }), Some(missing.as_str())).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

/// Delays every call, to exercise the configured deadline.
#[derive(Debug, Clone)]
struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
}

#[async_trait]
impl StoreBackend for SlowStore {
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        tokio::time::sleep(self.delay).await;
        StoreBackend::query_documents(&self.inner, query, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        tokio::time::sleep(self.delay).await;
        StoreBackend::count_documents(&self.inner, filter, collection).await
    }

    async fn insert_document(&self, id: DocumentId, document: Document, collection: &str) -> DocumentStoreResult<()> {
        tokio::time::sleep(self.delay).await;
        StoreBackend::insert_document(&self.inner, id, document, collection).await
    }

    async fn update_fields(
        &self,
        id: DocumentId,
        sets: Vec<(FieldPath, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        tokio::time::sleep(self.delay).await;
        StoreBackend::update_fields(&self.inner, id, sets, collection).await
    }

    async fn delete_document(&self, id: DocumentId, collection: &str) -> DocumentStoreResult<u64> {
        tokio::time::sleep(self.delay).await;
        StoreBackend::delete_document(&self.inner, id, collection).await
    }
}

#[tokio::test]
async fn slow_store_hits_the_deadline() {
    init_tracing();
    let inner = InMemoryStore::new();
    inner.seed(BOOKS, books()).await.unwrap();

    let store = GridStore::new(
        SlowStore { inner, delay: Duration::from_millis(500) },
        GridConfig::new(BOOKS, book_schema()).with_timeout(Some(Duration::from_millis(20))),
    );

    let reply = handle_grid(&store, &grid_body()).await;
    assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(reply.body["draw"], json!(4));
    assert_eq!(reply.body["data"], json!([]));

    let reply = handle_editor(&store, &json!({ "action": "create", "data": { "0": { "Title": "Late" } } }), None).await;
    assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);
}

/// Fails every call as if the cluster were unreachable.
#[derive(Debug)]
struct DownStore;

fn down<T>() -> DocumentStoreResult<T> {
    Err(DocumentStoreError::Unavailable("connection refused by 10.1.2.3:27017".into()))
}

#[async_trait]
impl StoreBackend for DownStore {
    async fn query_documents(&self, _: Query, _: &str) -> DocumentStoreResult<Vec<Document>> {
        down()
    }

    async fn count_documents(&self, _: Option<Expr>, _: &str) -> DocumentStoreResult<u64> {
        down()
    }

    async fn insert_document(&self, _: DocumentId, _: Document, _: &str) -> DocumentStoreResult<()> {
        down()
    }

    async fn update_fields(&self, _: DocumentId, _: Vec<(FieldPath, Bson)>, _: &str) -> DocumentStoreResult<Option<Document>> {
        down()
    }

    async fn delete_document(&self, _: DocumentId, _: &str) -> DocumentStoreResult<u64> {
        down()
    }
}

#[tokio::test]
async fn unavailable_store_hides_detail() {
    init_tracing();
    let store = GridStore::new(DownStore, GridConfig::new(BOOKS, book_schema()));

    let reply = handle_grid(&store, &grid_body()).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!reply.body["error"].as_str().unwrap().contains("10.1.2.3"));

    let reply = handle_editor(&store, &json!({ "action": "remove" }), Some(DocumentId::generate().to_string().as_str())).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.body["data"], json!([]));
}

#[tokio::test]
async fn runtime_selected_backend_serves_grid() {
    init_tracing();
    let inner = InMemoryStore::new();
    inner.seed(BOOKS, books()).await.unwrap();

    let backend: Box<dyn DynStoreBackend> = Box::new(inner);
    let store = GridStore::new(backend, GridConfig::new(BOOKS, book_schema()));

    let reply = handle_grid(&store, &grid_body()).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["recordsTotal"], json!(3));
    assert!((**store.backend()).as_any().downcast_ref::<InMemoryStore>().is_some());

    store.shutdown().await.unwrap();
}
