//! MongoDB backend implementation for docgrid.
//!
//! This crate implements `StoreBackend` on top of the official async MongoDB driver.
//! Filters and sorts are translated to native MongoDB query documents, so paging, counting
//! and searching all run inside the server.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docgrid = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! [`MongoDbStoreBuilder::from_env`] reads `MONGO_URI` and falls back to
//! `mongodb://localhost:27017/book_database`. The database is taken from the connection
//! string's path unless one is set on the builder.
//!
//! # Example
//!
//! ```ignore
//! use docgrid::{backend::StoreBackendBuilder, mongodb::MongoDbStoreBuilder};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStoreBuilder::from_env()
//!         .server_selection_timeout(Duration::from_secs(5))
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgrid_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder, map_mongo_error};
