//! Query expression evaluation for in-memory document filtering.
//!
//! Values are compared the way MongoDB compares them, so the in-memory backend can stand
//! in for a real store in tests:
//!
//! - numbers compare by value across `Int32`, `Int64` and `Double`;
//! - ordering comparisons (`Gt`, `Lte`, ...) only match values of the same type bracket;
//! - a predicate on an array field matches when the array or any element matches;
//! - a missing field equals `null`;
//! - sorting across types follows the BSON type order (see [`type_rank`]).

use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};
use std::{
    cmp::Ordering,
    collections::{HashMap, hash_map::Entry},
};

use docgrid_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    path::FieldPath,
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Position of a value's type in MongoDB's cross-type sort order.
///
/// Missing and `null` sort first, then numbers, strings, documents, arrays, object ids,
/// booleans, and dates. Everything else sorts last.
pub(crate) fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 2,
        Some(Bson::String(_) | Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(_) => 10,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Total order over optional BSON values: type rank first, then value.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    let (Some(left), Some(right)) = (left, right) else {
        return Ordering::Equal;
    };

    match (left, right) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.timestamp_millis().cmp(&b.timestamp_millis()),
        (Bson::Array(a), Bson::Array(b)) => compare_sequences(a.iter(), b.iter()),
        (Bson::Document(a), Bson::Document(b)) => compare_documents(a, b),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn compare_sequences<'v>(
    left: impl Iterator<Item = &'v Bson>,
    right: impl Iterator<Item = &'v Bson>,
) -> Ordering {
    let mut left = left;
    let mut right = right;

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => match compare_values(Some(a), Some(b)) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

fn compare_documents(left: &Document, right: &Document) -> Ordering {
    let mut left = left.iter();
    let mut right = right.iter();

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((ka, va)), Some((kb, vb))) => {
                let ordering = ka
                    .cmp(kb)
                    .then_with(|| compare_values(Some(va), Some(vb)));

                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn values_equal(left: Option<&Bson>, right: &Bson) -> bool {
    type_rank(left) == type_rank(Some(right)) && compare_values(left, Some(right)) == Ordering::Equal
}

/// The value a document sorts by for one key.
///
/// Arrays sort by their smallest element ascending and their largest descending. An empty
/// array sorts before `null`.
fn sort_value(value: Option<&Bson>, direction: SortDirection) -> Option<Option<&Bson>> {
    match value {
        Some(Bson::Array(items)) => {
            let pick = items.iter().reduce(|best, item| {
                let ordering = compare_values(Some(item), Some(best));
                match (direction, ordering) {
                    (SortDirection::Asc, Ordering::Less) | (SortDirection::Desc, Ordering::Greater) => item,
                    _ => best,
                }
            });

            pick.map(Some)
        }
        other => Some(other),
    }
}

/// Orders documents by the sort keys, primary first. Ties keep their current order.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        sort.iter()
            .map(|key| {
                let left = sort_value(key.field.lookup(a), key.direction);
                let right = sort_value(key.field.lookup(b), key.direction);

                let ordering = match (left, right) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(left), Some(right)) => compare_values(left, right),
                };

                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Compiled case-insensitive patterns, shared across the documents of one query.
#[derive(Debug, Default)]
pub(crate) struct RegexCache {
    compiled: HashMap<String, Regex>,
}

impl RegexCache {
    fn get(&mut self, pattern: &str) -> DocumentStoreResult<&Regex> {
        match self.compiled.entry(pattern.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| DocumentStoreError::InvalidDocument(format!("invalid pattern {pattern:?}: {e}")))?;

                Ok(entry.insert(regex))
            }
        }
    }
}

pub(crate) struct DocumentEvaluator<'d, 'c> {
    document: &'d Document,
    regexes: &'c mut RegexCache,
}

impl<'d, 'c> DocumentEvaluator<'d, 'c> {
    pub fn new(document: &'d Document, regexes: &'c mut RegexCache) -> Self {
        Self { document, regexes }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents<'a>(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: Option<&Expr>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut regexes = RegexCache::default();
        let mut matched = Vec::new();

        for document in documents {
            let keep = match expr {
                Some(expr) => DocumentEvaluator::new(document, &mut regexes).evaluate(expr)?,
                None => true,
            };

            if keep {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn text_matches(&mut self, candidate: &Bson, op: FieldOp, needle: &str) -> DocumentStoreResult<bool> {
        match candidate {
            Bson::String(text) => match op {
                FieldOp::Regex => Ok(self.regexes.get(needle)?.is_match(text)),
                _ => Ok(text.to_lowercase().contains(&needle.to_lowercase())),
            },
            Bson::Array(items) => {
                for item in items {
                    if let Bson::String(_) = item {
                        if self.text_matches(item, op, needle)? {
                            return Ok(true);
                        }
                    }
                }

                Ok(false)
            }
            _ => Ok(false),
        }
    }
}

/// Checks `predicate` against the value and, for arrays, against each element.
fn any_candidate(value: Option<&Bson>, predicate: impl Fn(Option<&Bson>) -> bool) -> bool {
    if predicate(value) {
        return true;
    }

    match value {
        Some(Bson::Array(items)) => items.iter().any(|item| predicate(Some(item))),
        _ => false,
    }
}

impl<'d, 'c> QueryVisitor for DocumentEvaluator<'d, 'c> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_field(&mut self, field: &FieldPath, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let current = field.lookup(self.document);

        match op {
            FieldOp::Eq => Ok(any_candidate(current, |candidate| values_equal(candidate, value))),
            FieldOp::Ne => Ok(!any_candidate(current, |candidate| values_equal(candidate, value))),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => Ok(any_candidate(current, |candidate| {
                let Some(candidate) = candidate else {
                    return false;
                };
                if type_rank(Some(candidate)) != type_rank(Some(value)) {
                    return false;
                }

                let ordering = compare_values(Some(candidate), Some(value));
                match op {
                    FieldOp::Gt => ordering == Ordering::Greater,
                    FieldOp::Gte => ordering != Ordering::Less,
                    FieldOp::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            })),
            FieldOp::Contains | FieldOp::Regex => {
                let (Some(candidate), Bson::String(needle)) = (current, value) else {
                    return Ok(false);
                };

                self.text_matches(candidate, op, needle)
            }
            FieldOp::AnyOf => {
                let options = match value {
                    Bson::Array(options) => options.as_slice(),
                    single => std::slice::from_ref(single),
                };

                Ok(options
                    .iter()
                    .any(|option| any_candidate(current, |candidate| values_equal(candidate, option))))
            }
        }
    }
}
