//! Document identifiers and helpers for the `_id` key.
//!
//! Stores address documents by a [`DocumentId`]. At the wire boundary ids are plain
//! strings: a 24-digit hex string is read as an [`ObjectId`], anything else is kept as a
//! string id. New documents get a fresh `ObjectId`.

use bson::{Bson, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// The key documents carry their identifier under.
pub const ID_KEY: &str = "_id";

/// A store-native document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    ObjectId(ObjectId),
    String(String),
}

impl DocumentId {
    /// Generates a fresh `ObjectId` identifier.
    pub fn generate() -> Self {
        DocumentId::ObjectId(ObjectId::new())
    }

    /// Parses a wire id: 24 hex digits become an `ObjectId`, other strings stay strings.
    pub fn parse(id: &str) -> DocumentStoreResult<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(DocumentStoreError::InvalidDocument("empty document id".to_string()));
        }

        Ok(match ObjectId::parse_str(id) {
            Ok(oid) => DocumentId::ObjectId(oid),
            Err(_) => DocumentId::String(id.to_string()),
        })
    }

    /// Reads an id from a BSON value, accepting only `ObjectId` and string ids.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::ObjectId(oid) => Some(DocumentId::ObjectId(*oid)),
            Bson::String(s) => Some(DocumentId::String(s.clone())),
            _ => None,
        }
    }

    /// Reads the `_id` of a stored document.
    pub fn of(document: &Document) -> Option<Self> {
        document.get(ID_KEY).and_then(Self::from_bson)
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            DocumentId::ObjectId(oid) => Bson::ObjectId(*oid),
            DocumentId::String(s) => Bson::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::ObjectId(oid) => write!(f, "{}", oid.to_hex()),
            DocumentId::String(s) => f.write_str(s),
        }
    }
}

impl FromStr for DocumentId {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        DocumentId::ObjectId(oid)
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        id.to_bson()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn parses_object_ids_and_plain_strings() {
        let hex = "65a1f0c2e4b0a1b2c3d4e5f6";

        assert!(matches!(DocumentId::parse(hex).unwrap(), DocumentId::ObjectId(_)));
        assert_eq!(DocumentId::parse(hex).unwrap().to_string(), hex);
        assert_eq!(DocumentId::parse(" book-1 ").unwrap(), DocumentId::String("book-1".into()));
        assert!(DocumentId::parse("  ").is_err());
    }

    #[test]
    fn reads_id_from_documents() {
        let oid = ObjectId::new();

        assert_eq!(DocumentId::of(&doc! { "_id": oid }), Some(DocumentId::ObjectId(oid)));
        assert_eq!(DocumentId::of(&doc! { "_id": "x" }), Some(DocumentId::String("x".into())));
        assert_eq!(DocumentId::of(&doc! { "_id": 5 }), None);
        assert_eq!(DocumentId::of(&doc! { "Title": "x" }), None);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(DocumentId::generate(), DocumentId::generate());
    }
}
