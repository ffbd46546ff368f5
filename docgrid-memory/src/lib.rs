//! In-memory document storage backend for docgrid.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates the store-neutral query AST directly over BSON documents, following
//! MongoDB's comparison and ordering rules, and is meant for development, tests and demos.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Nested paths** - Filters, sorts and updates address nested documents by path
//! - **Full query support** - Filtering, multi-key sorting, and pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use docgrid_memory::InMemoryStore;
//! use docgrid_core::backend::StoreBackendBuilder;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .with_documents("books", vec![doc! { "Title": "Dune", "Pages": 412 }])
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgrid_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
