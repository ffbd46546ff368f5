//! Nested document paths.
//!
//! A [`FieldPath`] is an ordered sequence of key segments such as `PublisherInfo.Date`.
//! Segments are validated when the path is built: they are non-empty, never start with
//! `$`, and never contain `.` or NUL. This makes a dotted rendering unambiguous and safe to
//! hand to a store's nested-field syntax.
//!
//! Documents are read and written by walking segments explicitly:
//!
//! ```ignore
//! use bson::doc;
//! use docgrid_core::path::FieldPath;
//!
//! let path: FieldPath = "PublisherInfo.Date".parse()?;
//! let mut document = doc! { "PublisherInfo": { "Name": "Orbit" } };
//!
//! path.assign(&mut document, "2001-01-01".into())?;
//! assert_eq!(path.lookup(&document).and_then(|v| v.as_str()), Some("2001-01-01"));
//! ```

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// An error produced when parsing or using a [`FieldPath`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("segment {0} of path is empty")]
    EmptySegment(usize),
    #[error("segment {0:?} starts with '$'")]
    Operator(String),
    #[error("segment {0:?} contains a reserved character")]
    ReservedChar(String),
    #[error("cannot create field {segment:?} inside non-document value at {parent}")]
    NotADocument { parent: String, segment: String },
}

/// A validated, non-empty path into a nested document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Builds a path from individual segments, validating each of them.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();

        if segments.is_empty() {
            return Err(PathError::Empty);
        }

        for (position, segment) in segments.iter().enumerate() {
            Self::validate_segment(position, segment)?;
        }

        Ok(Self { segments })
    }

    fn validate_segment(position: usize, segment: &str) -> Result<(), PathError> {
        if segment.is_empty() {
            return Err(PathError::EmptySegment(position));
        }
        if segment.starts_with('$') {
            return Err(PathError::Operator(segment.to_string()));
        }
        if segment.contains(['.', '\0']) {
            return Err(PathError::ReservedChar(segment.to_string()));
        }

        Ok(())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; paths have at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Dotted rendering, as used by store nested-field syntax.
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Returns true if `self` is a prefix of `other` (or equal to it).
    pub fn is_ancestor_of(&self, other: &FieldPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Returns true if either path addresses a part of the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// Reads the value at this path.
    ///
    /// A missing segment, or an intermediate value that is not a document, yields `None`.
    pub fn lookup<'d>(&self, document: &'d Document) -> Option<&'d Bson> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = document;

        for segment in parents {
            current = current.get(segment)?.as_document()?;
        }

        current.get(last)
    }

    /// Writes `value` at this path, creating intermediate documents as needed.
    ///
    /// Sibling keys of every intermediate document are preserved. An intermediate value
    /// that exists but is not a document is reported as [`PathError::NotADocument`].
    pub fn assign(&self, document: &mut Document, value: Bson) -> Result<(), PathError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(PathError::Empty);
        };
        let mut current = document;

        for (depth, segment) in parents.iter().enumerate() {
            if !current.contains_key(segment) {
                current.insert(segment.clone(), Document::new());
            }

            current = match current.get_mut(segment) {
                Some(Bson::Document(child)) => child,
                _ => {
                    return Err(PathError::NotADocument {
                        parent: self.segments[..=depth].join("."),
                        segment: self.segments[depth + 1].clone(),
                    })
                }
            };
        }

        current.insert(last.clone(), value);

        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        Self::from_segments(s.split('.'))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_dotted()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_dotted())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    #[test]
    fn parses_dotted_paths_into_segments() {
        let p = path("PublisherInfo.Date");
        assert_eq!(p.segments(), ["PublisherInfo", "Date"]);
        assert_eq!(p.len(), 2);
        assert_eq!(p.to_string(), "PublisherInfo.Date");
    }

    #[test]
    fn rejects_unsafe_segments() {
        assert_eq!("".parse::<FieldPath>(), Err(PathError::Empty));
        assert_eq!("a..b".parse::<FieldPath>(), Err(PathError::EmptySegment(1)));
        assert_eq!("a.$set".parse::<FieldPath>(), Err(PathError::Operator("$set".into())));
        assert!(matches!(
            FieldPath::from_segments(["a.b"]),
            Err(PathError::ReservedChar(_))
        ));
        assert!(matches!(
            FieldPath::from_segments(["a\0"]),
            Err(PathError::ReservedChar(_))
        ));
    }

    #[test]
    fn ancestry_and_overlap() {
        let parent = path("PublisherInfo");
        let child = path("PublisherInfo.Date");
        let sibling = path("PublisherInfo.Name");

        assert!(parent.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&parent));
        assert!(child.overlaps(&parent));
        assert!(!child.overlaps(&sibling));
        assert!(!path("Pub").overlaps(&parent));
    }

    #[test]
    fn lookup_walks_segments() {
        let document = doc! { "PublisherInfo": { "Date": "2001", "Name": "Orbit" }, "Title": 7 };

        assert_eq!(path("PublisherInfo.Name").lookup(&document), Some(&Bson::String("Orbit".into())));
        assert_eq!(path("Title").lookup(&document), Some(&Bson::Int32(7)));
        assert_eq!(path("PublisherInfo.Missing").lookup(&document), None);
        assert_eq!(path("Missing.Date").lookup(&document), None);
        assert_eq!(path("Title.Sub").lookup(&document), None);
    }

    #[test]
    fn assign_preserves_siblings() {
        let mut document = doc! { "PublisherInfo": { "Date": "2001", "Name": "Orbit" } };

        path("PublisherInfo.Date").assign(&mut document, Bson::String("2002".into())).unwrap();

        assert_eq!(document, doc! { "PublisherInfo": { "Date": "2002", "Name": "Orbit" } });
    }

    #[test]
    fn assign_creates_intermediate_documents() {
        let mut document = Document::new();

        path("a.b.c").assign(&mut document, Bson::Int32(1)).unwrap();

        assert_eq!(document, doc! { "a": { "b": { "c": 1 } } });
    }

    #[test]
    fn assign_refuses_to_replace_scalars() {
        let mut document = doc! { "a": 5 };

        let err = path("a.b").assign(&mut document, Bson::Int32(1)).unwrap_err();

        assert_eq!(err, PathError::NotADocument { parent: "a".into(), segment: "b".into() });
        assert_eq!(document, doc! { "a": 5 });
    }

    #[test]
    fn serde_uses_dotted_form() {
        let p: FieldPath = serde_json::from_str("\"a.b\"").unwrap();
        assert_eq!(p, path("a.b"));
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"a.b\"");
        assert!(serde_json::from_str::<FieldPath>("\"$a\"").is_err());
    }
}
