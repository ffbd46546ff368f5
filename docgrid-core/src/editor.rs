//! Row edits to document mutations.
//!
//! The [`Editor`] validates and coerces the values submitted for one action. Every
//! problem found is collected into [`FieldErrors`] before anything reaches the store, so
//! an action either applies in full or not at all. Applying the prepared mutation is left
//! to [`GridStore`](crate::store::GridStore).
//!
//! Submitted keys may be a field's alias or its path. Keys outside the schema are kept as
//! opaque data unless the editor is strict. They still have to be valid paths.

use bson::{Bson, Document, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::{
    coerce::CoercionError,
    document::{DocumentId, ID_KEY},
    error::{BridgeError, BridgeResult, FieldError, FieldErrorReason, FieldErrors},
    path::FieldPath,
    request::Row,
    schema::{FieldSchema, ROW_ID_KEY},
};

/// Submitted values, keyed by alias or path.
pub type FieldValues = Map<String, Value>;

/// One row-level mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    Create(FieldValues),
    Update(DocumentId, FieldValues),
    Remove(DocumentId),
}

/// The action kind of an editor request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Create,
    Edit,
    Remove,
}

/// One row of an editor request: the row id (or a client placeholder for creates) and
/// the values submitted for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EditItem {
    pub key: String,
    pub values: FieldValues,
}

impl EditItem {
    pub fn new(key: impl Into<String>, values: FieldValues) -> Self {
        Self { key: key.into(), values }
    }

    /// Turns the item into the action `kind` implies, parsing the row id when needed.
    pub fn into_action(self, kind: EditKind) -> BridgeResult<EditAction> {
        let id = || {
            DocumentId::parse(&self.key)
                .map_err(|_| BridgeError::Validation(format!("invalid row id {:?}", self.key)))
        };

        Ok(match kind {
            EditKind::Create => EditAction::Create(self.values),
            EditKind::Edit => EditAction::Update(id()?, self.values),
            EditKind::Remove => EditAction::Remove(id()?),
        })
    }
}

/// A batch of same-kind edits. Items are applied independently.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub kind: EditKind,
    pub items: Vec<EditItem>,
}

impl EditRequest {
    pub fn new(kind: EditKind) -> Self {
        Self { kind, items: Vec::new() }
    }

    pub fn item(mut self, key: impl Into<String>, values: FieldValues) -> Self {
        self.items.push(EditItem::new(key, values));
        self
    }
}

/// An item of a batch that could not be applied.
#[derive(Debug)]
pub struct EditFailure {
    /// The row id or create placeholder the client sent.
    pub key: String,
    pub error: BridgeError,
}

/// Per-item results of a batch: rows for applied creates and updates, and the failures.
#[derive(Debug, Default)]
pub struct EditOutcome {
    pub rows: Vec<Row>,
    pub failures: Vec<EditFailure>,
    /// Number of items applied, removals included.
    pub applied: usize,
}

impl EditOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Validates and coerces submitted values against a schema.
#[derive(Debug, Clone, Copy)]
pub struct Editor<'s> {
    schema: &'s FieldSchema,
    strict: bool,
}

struct Assignment {
    key: String,
    path: FieldPath,
    value: Bson,
}

impl<'s> Editor<'s> {
    pub fn new(schema: &'s FieldSchema, strict: bool) -> Self {
        Self { schema, strict }
    }

    /// Builds the nested document a create inserts.
    ///
    /// Required fields that are absent, or submitted as `null`, are field errors.
    pub fn prepare_create(&self, values: &FieldValues) -> BridgeResult<Document> {
        let mut errors = FieldErrors::new();
        let assignments = self.assignments(values, &mut errors);

        for field in self.schema.fields().iter().filter(|field| field.is_required()) {
            let supplied = assignments
                .iter()
                .any(|assignment| &assignment.path == field.path() && assignment.value != Bson::Null);

            if !supplied {
                errors.push(FieldError::new(field.display_name(), FieldErrorReason::Missing));
            }
        }

        errors.into_result()?;

        let mut document = Document::new();
        for assignment in assignments {
            assignment
                .path
                .assign(&mut document, assignment.value)
                .map_err(|e| field_error(&assignment.key, FieldErrorReason::InvalidPath(e.to_string())))?;
        }

        Ok(document)
    }

    /// Builds the targeted field sets an update applies.
    pub fn prepare_update(&self, values: &FieldValues) -> BridgeResult<Vec<(FieldPath, Bson)>> {
        let mut errors = FieldErrors::new();
        let assignments = self.assignments(values, &mut errors);

        errors.into_result()?;

        if assignments.is_empty() {
            return Err(BridgeError::Validation("no fields to update".to_string()));
        }

        Ok(assignments
            .into_iter()
            .map(|assignment| (assignment.path, assignment.value))
            .collect())
    }

    fn assignments(&self, values: &FieldValues, errors: &mut FieldErrors) -> Vec<Assignment> {
        let mut assignments: Vec<Assignment> = Vec::with_capacity(values.len());

        for (key, value) in values {
            if key == ROW_ID_KEY {
                continue;
            }

            let Some(assignment) = self.assignment(key, value, errors) else {
                continue;
            };

            if let Some(other) = assignments
                .iter()
                .find(|other| other.path.overlaps(&assignment.path))
            {
                errors.push(FieldError::new(key.as_str(), FieldErrorReason::Conflict(other.key.clone())));
                continue;
            }

            assignments.push(assignment);
        }

        assignments
    }

    fn assignment(&self, key: &str, value: &Value, errors: &mut FieldErrors) -> Option<Assignment> {
        if let Some(field) = self.schema.resolve(key) {
            return match field.coerce(value) {
                Ok(coerced) => Some(Assignment {
                    key: key.to_string(),
                    path: field.path().clone(),
                    value: coerced,
                }),
                Err(e) => {
                    errors.push(FieldError::new(key, e));
                    None
                }
            };
        }

        if self.strict {
            errors.push(FieldError::new(key, FieldErrorReason::Unknown));
            return None;
        }

        let path = match key.parse::<FieldPath>() {
            Ok(path) if path.segments()[0] == ID_KEY => {
                errors.push(FieldError::new(key, FieldErrorReason::InvalidPath(format!("{ID_KEY} is managed by the store"))));
                return None;
            }
            Ok(path) => path,
            Err(e) => {
                errors.push(FieldError::new(key, FieldErrorReason::InvalidPath(e.to_string())));
                return None;
            }
        };

        match serialize_to_bson(value) {
            Ok(value) => Some(Assignment { key: key.to_string(), path, value }),
            Err(_) => {
                errors.push(FieldError::new(key, CoercionError::InvalidText));
                None
            }
        }
    }
}

fn field_error(key: &str, reason: FieldErrorReason) -> BridgeError {
    let mut errors = FieldErrors::new();
    errors.push(FieldError::new(key, reason));

    BridgeError::Fields(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use bson::doc;
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::new("Title", FieldType::Text).unwrap().required(),
            FieldSpec::new("Pages", FieldType::Number).unwrap(),
            FieldSpec::new("PublisherInfo.Date", FieldType::Date).unwrap().with_alias("Published"),
            FieldSpec::new("PublisherInfo.Name", FieldType::Text).unwrap(),
            FieldSpec::new("Themes", FieldType::Array).unwrap(),
        ])
        .unwrap()
    }

    fn values(value: Value) -> FieldValues {
        match value {
            Value::Object(map) => map,
            _ => panic!("values must be an object"),
        }
    }

    #[test]
    fn create_expands_paths_into_nested_documents() {
        let schema = schema();
        let editor = Editor::new(&schema, false);

        let document = editor
            .prepare_create(&values(json!({
                "DT_RowId": "ignored",
                "Title": " Dune ",
                "Pages": "412",
                "Published": "1965-08-01",
                "PublisherInfo.Name": "Chilton",
                "Themes": "Ecology, Politics",
                "Extra.Note": { "free": "form" },
            })))
            .unwrap();

        assert_eq!(
            document,
            doc! {
                "Title": "Dune",
                "Pages": 412_i64,
                "PublisherInfo": {
                    "Date": bson::DateTime::from_millis(-139_449_600_000),
                    "Name": "Chilton",
                },
                "Themes": ["Ecology", "Politics"],
                "Extra": { "Note": { "free": "form" } },
            }
        );
    }

    #[test]
    fn create_collects_every_field_error() {
        let schema = schema();
        let editor = Editor::new(&schema, false);

        let err = editor
            .prepare_create(&values(json!({
                "Pages": "many",
                "Published": "someday",
                "bad..key": 1,
            })))
            .unwrap_err();

        let errors = err.field_errors().unwrap();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors.get("Pages"), Some(&FieldErrorReason::Coercion(CoercionError::InvalidNumber("many".into()))));
        assert!(matches!(errors.get("Published"), Some(FieldErrorReason::Coercion(CoercionError::InvalidDate(_)))));
        assert!(matches!(errors.get("bad..key"), Some(FieldErrorReason::InvalidPath(_))));
        assert_eq!(errors.get("Title"), Some(&FieldErrorReason::Missing));
    }

    #[test]
    fn required_fields_reject_null() {
        let schema = schema();
        let err = Editor::new(&schema, false)
            .prepare_create(&values(json!({ "Title": null })))
            .unwrap_err();

        assert_eq!(err.field_errors().unwrap().get("Title"), Some(&FieldErrorReason::Missing));
    }

    #[test]
    fn strict_mode_rejects_unknown_fields() {
        let schema = schema();
        let err = Editor::new(&schema, true)
            .prepare_create(&values(json!({ "Title": "Dune", "Color": "red" })))
            .unwrap_err();

        assert_eq!(err.field_errors().unwrap().get("Color"), Some(&FieldErrorReason::Unknown));
    }

    #[test]
    fn overlapping_keys_conflict() {
        let schema = schema();
        let err = Editor::new(&schema, false)
            .prepare_update(&values(json!({
                "Published": "2001-01-01",
                "PublisherInfo": { "Name": "Orbit" },
            })))
            .unwrap_err();

        assert_eq!(
            err.field_errors().unwrap().get("PublisherInfo"),
            Some(&FieldErrorReason::Conflict("Published".into()))
        );
    }

    #[test]
    fn update_targets_exact_paths() {
        let schema = schema();
        let sets = Editor::new(&schema, false)
            .prepare_update(&values(json!({ "DT_RowId": "x", "Published": "2001-01-01" })))
            .unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, "PublisherInfo.Date".parse::<FieldPath>().unwrap());
        assert_eq!(sets[0].1, Bson::DateTime(bson::DateTime::from_millis(978_307_200_000)));
    }

    #[test]
    fn update_refuses_empty_and_id_changes() {
        let schema = schema();
        let editor = Editor::new(&schema, false);

        let empty = editor.prepare_update(&values(json!({ "DT_RowId": "x" }))).unwrap_err();
        assert!(matches!(empty, BridgeError::Validation(_)));

        let id = editor.prepare_update(&values(json!({ "_id": "other" }))).unwrap_err();
        assert!(matches!(id.field_errors().unwrap().get("_id"), Some(FieldErrorReason::InvalidPath(_))));
    }

    #[test]
    fn create_never_carries_an_id() {
        let schema = schema();

        let loose = Editor::new(&schema, false)
            .prepare_create(&values(json!({ "Title": "A", "_id": "mine" })))
            .unwrap_err();
        assert!(matches!(loose.field_errors().unwrap().get("_id"), Some(FieldErrorReason::InvalidPath(_))));

        let strict = Editor::new(&schema, true)
            .prepare_create(&values(json!({ "Title": "A", "_id": "mine" })))
            .unwrap_err();
        assert_eq!(strict.field_errors().unwrap().get("_id"), Some(&FieldErrorReason::Unknown));
    }

    #[test]
    fn items_become_actions() {
        let hex = "65a1f0c2e4b0a1b2c3d4e5f6";

        let update = EditItem::new(hex, FieldValues::new()).into_action(EditKind::Edit).unwrap();
        assert!(matches!(update, EditAction::Update(DocumentId::ObjectId(_), _)));

        let create = EditItem::new("0", FieldValues::new()).into_action(EditKind::Create).unwrap();
        assert!(matches!(create, EditAction::Create(_)));

        assert!(EditItem::new(" ", FieldValues::new()).into_action(EditKind::Remove).is_err());
    }
}
