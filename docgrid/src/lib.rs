//! Server-side DataTables and Editor support for schemaless document stores.
//!
//! This crate is the entry point of the docgrid workspace. It re-exports the core engine
//! from `docgrid-core`, the storage backends, and adds the [`transport`] adapter that
//! maps DataTables / Editor request bodies onto a [`store::GridStore`].
//!
//! # Features
//!
//! - **Typed fields over schemaless documents** - A field schema drives coercion, search and sort
//! - **Nested paths** - Search, sort and partially update fields like `PublisherInfo.Date`
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//! - **Wire protocol** - Request decoding, error-to-status mapping and Editor field errors
//!
//! # Quick Start
//!
//! ```ignore
//! use docgrid::{prelude::*, memory::InMemoryStore, transport};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = FieldSchema::new(vec![
//!         FieldSpec::new("Title", FieldType::Text)?,
//!         FieldSpec::new("Pages", FieldType::Number)?,
//!         FieldSpec::new("PublisherInfo.Date", FieldType::Date)?.with_alias("Published"),
//!     ])?;
//!
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = GridStore::new(backend, GridConfig::new("books", schema));
//!
//!     // Create a row the way DataTables Editor submits it
//!     let reply = transport::handle_editor(
//!         &store,
//!         &json!({ "action": "create", "data": { "0": { "Title": "Dune", "Pages": "412" } } }),
//!         None,
//!     )
//!     .await;
//!     assert_eq!(reply.status, http::StatusCode::OK);
//!
//!     // Read a sorted page
//!     let reply = transport::handle_grid(
//!         &store,
//!         &json!({ "draw": 1, "start": 0, "length": 10, "columns": [{ "data": "Pages" }], "order": [{ "column": 0, "dir": "desc" }] }),
//!     )
//!     .await;
//!     println!("{}", reply.body);
//!
//!     store.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;
pub mod transport;

pub use docgrid_core::{
    backend, coerce, collection, config, document, editor, error, path, project, query, request, schema, store,
    translate,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgrid_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgrid_mongodb::{MongoDbStore, MongoDbStoreBuilder, map_mongo_error};
}
