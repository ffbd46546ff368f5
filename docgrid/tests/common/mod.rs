#![allow(dead_code)]

use bson::{Bson, Document, doc};
use docgrid::{
    coerce::{parse_date, to_bson_datetime},
    config::GridConfig,
    document::DocumentId,
    memory::InMemoryStore,
    schema::{FieldSchema, FieldSpec, FieldType},
    store::GridStore,
};

pub const BOOKS: &str = "books";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

pub fn date(input: &str) -> Bson {
    Bson::DateTime(to_bson_datetime(parse_date(input).unwrap()))
}

pub fn book_schema() -> FieldSchema {
    FieldSchema::new(vec![
        FieldSpec::new("Title", FieldType::Text).unwrap().required(),
        FieldSpec::new("Author", FieldType::Text).unwrap(),
        FieldSpec::new("PublisherInfo.Date", FieldType::Date).unwrap(),
        FieldSpec::new("PublisherInfo.Name", FieldType::Text).unwrap(),
        FieldSpec::new("Themes", FieldType::Array).unwrap(),
        FieldSpec::new("Pages", FieldType::Number).unwrap(),
        FieldSpec::new("Rating", FieldType::Number).unwrap(),
    ])
    .unwrap()
}

pub fn books() -> Vec<Document> {
    vec![
        doc! {
            "Title": "The Drowned Coast",
            "Author": "Mara Quill",
            "PublisherInfo": { "Name": "Orbit", "Date": date("2001-05-03") },
            "Themes": ["Environmental collapse", "Survival"],
            "Pages": 300,
            "Rating": 4,
        },
        doc! {
            "Title": "Glass Cities",
            "Author": "Ivo Brandt",
            "PublisherInfo": { "Name": "Tor", "Date": date("1999-11-20") },
            "Themes": ["Surveillance"],
            "Pages": 120,
            "Rating": 3,
        },
        doc! {
            "Title": "Ash Protocol",
            "Author": "Mara Quill",
            "PublisherInfo": { "Name": "Orbit", "Date": date("2010-01-15") },
            "Themes": ["Rebellion", "Surveillance"],
            "Pages": 450,
            "Rating": 5,
        },
    ]
}

/// A grid store over seeded books, plus a handle on the shared backend and the book ids.
pub async fn seeded(strict: bool) -> (GridStore<InMemoryStore>, InMemoryStore, Vec<DocumentId>) {
    init_tracing();

    let backend = InMemoryStore::new();
    let ids = backend.seed(BOOKS, books()).await.unwrap();
    let store = GridStore::new(backend.clone(), GridConfig::new(BOOKS, book_schema()).with_strict(strict));

    (store, backend, ids)
}
