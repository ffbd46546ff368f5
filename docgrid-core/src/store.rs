//! The grid store: one collection, one schema, one backend.
//!
//! [`GridStore`] is the entry point the transport layer drives. Reads go through the
//! [`QueryTranslator`] and [`Projector`], writes through the [`Editor`], and every store
//! call is bounded by the configured deadline.
//!
//! # Example
//!
//! ```ignore
//! use docgrid_core::{config::GridConfig, request::GridRequest, store::GridStore};
//!
//! let store = GridStore::new(backend, GridConfig::new("books", schema));
//! let page = store.rows(&GridRequest::default()).await?;
//! ```

use bson::{Bson, Document};
use tracing::{debug, instrument, warn};

use crate::{
    backend::StoreBackend,
    collection::Collection,
    config::GridConfig,
    document::{DocumentId, ID_KEY},
    editor::{EditAction, EditFailure, EditOutcome, EditRequest, Editor},
    error::{BridgeError, BridgeResult, DocumentStoreResult},
    project::Projector,
    request::{GridRequest, GridResponse, Row},
    translate::QueryTranslator,
};

#[derive(Debug)]
pub struct GridStore<B: StoreBackend> {
    backend: B,
    config: GridConfig,
}

impl<B: StoreBackend> GridStore<B> {
    pub fn new(backend: B, config: GridConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn collection(&self) -> Collection<'_, B> {
        Collection::new(self.config.collection.as_str(), &self.backend)
            .with_timeout(self.config.timeout())
    }

    fn projector(&self) -> Projector<'_> {
        Projector::new(&self.config.schema)
    }

    /// Answers one grid read: a page of rows and both counts.
    ///
    /// The page and each count are separate store requests. A store failure on any of
    /// them fails the whole read.
    #[instrument(skip_all, fields(collection = %self.config.collection, draw = request.draw))]
    pub async fn rows(&self, request: &GridRequest) -> BridgeResult<GridResponse> {
        let queries = QueryTranslator::new(&self.config.schema).translate(request)?;
        let collection = self.collection();

        let documents = collection.query(queries.page).await?;
        let records_filtered = collection.count(queries.filtered.filter).await?;
        let records_total = collection.count(queries.total.filter).await?;

        debug!(rows = documents.len(), records_filtered, records_total, "grid page loaded");

        Ok(GridResponse {
            draw: request.draw,
            records_total,
            records_filtered,
            data: self.projector().project_all(&documents),
        })
    }

    /// Applies one action. Creates and updates return the resulting row, removes `None`.
    #[instrument(skip_all, fields(collection = %self.config.collection))]
    pub async fn apply(&self, action: EditAction) -> BridgeResult<Option<Row>> {
        let editor = Editor::new(&self.config.schema, self.config.strict);
        let collection = self.collection();

        match action {
            EditAction::Create(values) => {
                let fields = editor.prepare_create(&values)?;
                let id = DocumentId::generate();
                let document = with_id(&id, fields);

                collection.insert(id.clone(), document.clone()).await?;
                debug!(%id, "document created");

                Ok(Some(self.projector().project(&document)))
            }
            EditAction::Update(id, values) => {
                let sets = editor.prepare_update(&values)?;

                match collection.update(id.clone(), sets).await? {
                    Some(document) => {
                        debug!(%id, "document updated");
                        Ok(Some(self.projector().project(&document)))
                    }
                    None => Err(BridgeError::NotFound(id.to_string())),
                }
            }
            EditAction::Remove(id) => match collection.delete(id.clone()).await? {
                0 => Err(BridgeError::NotFound(id.to_string())),
                _ => {
                    debug!(%id, "document removed");
                    Ok(None)
                }
            },
        }
    }

    /// Applies every item of a batch independently.
    ///
    /// Validation and not-found failures are recorded per item. A store timeout or outage
    /// stops the batch and fails the whole request, since later items would hit the same
    /// store. Items applied before it are not rolled back.
    #[instrument(skip_all, fields(collection = %self.config.collection, kind = ?request.kind, items = request.items.len()))]
    pub async fn edit(&self, request: EditRequest) -> BridgeResult<EditOutcome> {
        let mut outcome = EditOutcome::default();

        for item in request.items {
            let key = item.key.clone();
            let result = match item.into_action(request.kind) {
                Ok(action) => self.apply(action).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(row) => {
                    outcome.applied += 1;
                    outcome.rows.extend(row);
                }
                Err(e @ (BridgeError::StoreTimeout(_) | BridgeError::StoreUnavailable(_))) => return Err(e),
                Err(error) => {
                    warn!(%key, %error, "edit failed");
                    outcome.failures.push(EditFailure { key, error });
                }
            }
        }

        Ok(outcome)
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

fn with_id(id: &DocumentId, fields: Document) -> Document {
    let mut document = Document::new();
    document.insert(ID_KEY, Bson::from(id.clone()));
    for (key, value) in fields {
        if key != ID_KEY {
            document.insert(key, value);
        }
    }

    document
}
