//! Convenient re-exports of commonly used types from docgrid.
//!
//! ```ignore
//! use docgrid::prelude::*;
//! ```
//!
//! This provides access to:
//! - Field schemas and paths
//! - Grid requests and responses
//! - Editor actions and outcomes
//! - Store backends, builders and the grid store
//! - Error types

pub use docgrid_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    config::GridConfig,
    document::DocumentId,
    editor::{EditAction, EditKind, EditOutcome, EditRequest, FieldValues},
    error::{BridgeError, BridgeResult, DocumentStoreError, DocumentStoreResult, FieldErrorReason, FieldErrors},
    path::FieldPath,
    query::{Expr, FieldOp, Filter, Query, QueryVisitor, Sort, SortDirection},
    request::{GridRequest, GridResponse, PageLength, Row, SearchTerm},
    schema::{FieldSchema, FieldSpec, FieldType},
    store::GridStore,
};
