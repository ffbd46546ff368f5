//! Declarative description of the document paths a grid can read and edit.
//!
//! A [`FieldSchema`] is an ordered list of [`FieldSpec`]s. The declared [`FieldType`] of
//! each field drives coercion, search predicates, and rendering. Types are never inferred
//! from runtime values.
//!
//! # Example
//!
//! ```ignore
//! use docgrid_core::schema::{FieldSchema, FieldSpec, FieldType};
//!
//! let schema = FieldSchema::new(vec![
//!     FieldSpec::new("Title", FieldType::Text)?.required(),
//!     FieldSpec::new("Pages", FieldType::Number)?,
//!     FieldSpec::new("PublisherInfo.Date", FieldType::Date)?.with_alias("Published"),
//! ])?;
//!
//! assert_eq!(schema.resolve("Published").unwrap().path().to_string(), "PublisherInfo.Date");
//! ```

use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::{
    coerce::{self, CoercionError},
    document::ID_KEY,
    error::{BridgeError, BridgeResult},
    path::FieldPath,
};

/// Reserved row key carrying the document identifier.
pub const ROW_ID_KEY: &str = "DT_RowId";

/// The semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text, searched by substring.
    Text,
    /// Identifier-like string, searched by substring.
    String,
    /// Integer or floating point number.
    Number,
    /// Calendar date, stored as a timestamp.
    Date,
    /// List of strings, searched by element.
    Array,
}

impl FieldType {
    /// Returns true for types searched by substring or regular expression.
    pub fn is_textual(self) -> bool {
        matches!(self, FieldType::Text | FieldType::String | FieldType::Array)
    }
}

fn default_true() -> bool {
    true
}

/// Type and visibility metadata for one addressable document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    path: FieldPath,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias: Option<String>,
    #[serde(default = "default_true")]
    searchable: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    key: bool,
}

impl FieldSpec {
    /// Creates a searchable, optional field at `path`.
    pub fn new(path: &str, field_type: FieldType) -> BridgeResult<Self> {
        let path = path
            .parse::<FieldPath>()
            .map_err(|e| BridgeError::Validation(format!("invalid field path {path:?}: {e}")))?;

        Ok(Self::at(path, field_type))
    }

    /// Creates a searchable, optional field at an already validated path.
    pub fn at(path: FieldPath, field_type: FieldType) -> Self {
        Self {
            path,
            field_type,
            alias: None,
            searchable: true,
            required: false,
            key: false,
        }
    }

    /// Sets the display name used for inbound and outbound keys.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Excludes the field from global search.
    pub fn unsearchable(mut self) -> Self {
        self.searchable = false;
        self
    }

    /// Requires the field on create.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the value as used for a document key, so it may not contain `.`.
    pub fn as_key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    /// The key this field is exposed under in rows: the alias if set, else the path.
    pub fn display_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.path.to_dotted(),
        }
    }

    /// Coerces a wire value into the store representation for this field.
    pub fn coerce(&self, value: &Value) -> Result<Bson, CoercionError> {
        let coerced = coerce::to_store_value(self.field_type, value)?;

        if self.key && self.field_type == FieldType::String {
            if let Bson::String(s) = &coerced {
                if s.contains('.') {
                    return Err(CoercionError::DelimiterInKey(s.clone()));
                }
            }
        }

        Ok(coerced)
    }

    /// Renders a stored value into its wire representation for this field.
    pub fn render(&self, value: &Bson) -> Value {
        coerce::to_wire_value(self.field_type, value)
    }
}

/// An ordered, validated set of field declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Builds a schema, rejecting duplicate paths and ambiguous aliases.
    pub fn new(fields: Vec<FieldSpec>) -> BridgeResult<Self> {
        let paths = fields
            .iter()
            .map(|field| field.path.to_dotted())
            .collect::<Vec<_>>();
        let mut seen_paths = HashSet::new();
        let mut seen_aliases = HashSet::new();

        for (field, path) in fields.iter().zip(paths.iter()) {
            if path == ROW_ID_KEY {
                return Err(BridgeError::Validation(format!("{ROW_ID_KEY} is reserved")));
            }
            // The id is assigned on create and addresses the row afterwards.
            if field.path.segments()[0] == ID_KEY {
                return Err(BridgeError::Validation(format!("{path} is managed by the store")));
            }
            if !seen_paths.insert(path.as_str()) {
                return Err(BridgeError::Validation(format!("duplicate field path {path}")));
            }

            if let Some(alias) = field.alias() {
                if alias == ROW_ID_KEY {
                    return Err(BridgeError::Validation(format!("{ROW_ID_KEY} is reserved")));
                }
                if !seen_aliases.insert(alias) {
                    return Err(BridgeError::Validation(format!("duplicate field alias {alias}")));
                }
                if paths.iter().any(|other| other != path && other == alias) {
                    return Err(BridgeError::Validation(format!(
                        "alias {alias} of {path} collides with another field path"
                    )));
                }
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finds a field by its path.
    pub fn field(&self, path: &FieldPath) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| &field.path == path)
    }

    /// Finds a field by alias first, then by dotted path.
    pub fn resolve(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|field| field.alias() == Some(name))
            .or_else(|| self.fields.iter().find(|field| field.path.to_dotted() == name))
    }

    /// Like [`resolve`](Self::resolve), but unknown names are a validation error.
    pub fn require(&self, name: &str) -> BridgeResult<&FieldSpec> {
        self.resolve(name)
            .ok_or_else(|| BridgeError::Validation(format!("unknown field {name:?}")))
    }

    /// Fields participating in global search.
    pub fn searchable(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.searchable)
    }
}

impl TryFrom<Vec<FieldSpec>> for FieldSchema {
    type Error = BridgeError;

    fn try_from(fields: Vec<FieldSpec>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<FieldSchema> for Vec<FieldSpec> {
    fn from(schema: FieldSchema) -> Self {
        schema.fields
    }
}
