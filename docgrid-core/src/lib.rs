//! Core of the docgrid project: a bridge between server-side grid clients and schemaless
//! document stores.
//!
//! This crate provides:
//!
//! - **Field schema** ([`schema`]) - Declared paths, types and aliases a grid exposes
//! - **Field paths** ([`path`]) - Validated, segment-based nested document paths
//! - **Type coercion** ([`coerce`]) - Wire values to store values and back
//! - **Query and filtering API** ([`query`]) - Store-neutral query construction
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Collections interface** ([`collection`]) - Deadline-bound access to one collection
//! - **Grid requests** ([`request`]) and their translation to queries ([`translate`])
//! - **Result projection** ([`project`]) - Documents to grid rows
//! - **Editor engine** ([`editor`]) - Row edits to document mutations
//! - **Grid store** ([`store`]) - The entry point tying the above to one backend
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docgrid_core::{
//!     config::GridConfig,
//!     request::{GridRequest, PageLength},
//!     query::SortDirection,
//!     schema::{FieldSchema, FieldSpec, FieldType},
//!     store::GridStore,
//! };
//!
//! let schema = FieldSchema::new(vec![
//!     FieldSpec::new("Title", FieldType::Text)?,
//!     FieldSpec::new("Pages", FieldType::Number)?,
//! ])?;
//! let store = GridStore::new(backend, GridConfig::new("books", schema));
//!
//! let request = GridRequest::builder()
//!     .length(PageLength::Rows(2))
//!     .sort("Pages", SortDirection::Desc)
//!     .build();
//! let page = store.rows(&request).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgrid_core;

pub mod backend;
pub mod coerce;
pub mod collection;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod path;
pub mod project;
pub mod query;
pub mod request;
pub mod schema;
pub mod store;
pub mod translate;
