//! Store-neutral query construction and filtering API.
//!
//! Backends receive a [`Query`] made of an optional filter [`Expr`], ordered sort keys,
//! and a skip/limit window. Each backend interprets the expression tree through a
//! [`QueryVisitor`]: the in-memory backend evaluates it, the MongoDB backend translates it
//! into a native filter document.
//!
//! # Query Building
//!
//! ```ignore
//! use docgrid_core::query::{Query, Filter, SortDirection};
//!
//! let pages: FieldPath = "Pages".parse()?;
//! let query = Query::builder()
//!     .filter(Filter::gte(pages.clone(), 100))
//!     .sort(pages, SortDirection::Desc)
//!     .offset(10)
//!     .limit(10)
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Text: `contains` (case-insensitive substring), `regex` (case-insensitive pattern)
//! - Membership: `any_of`
//! - Logical: `and`, `or`
//!
//! Text operators applied to an array field match when any element matches.
//! An empty `and` matches every document and an empty `or` matches none.

use bson::Bson;

use crate::{error::DocumentStoreError, path::FieldPath};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field path to sort by.
    pub field: FieldPath,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String (or any array element) contains the value, ignoring case.
    Contains,
    /// String (or any array element) matches the regular expression, ignoring case.
    Regex,
    /// Field (or any array element) equals one of the values.
    AnyOf,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field path to compare.
        field: FieldPath,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: FieldPath, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }
}

/// A structured query for retrieving and filtering documents.
///
/// Sort keys apply in order: the first is primary, the next breaks its ties, and so on.
/// Documents equal on every key come back in unspecified order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return; `None` is unbounded.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
    /// Sort keys, primary first.
    pub sort: Vec<Sort>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: FieldPath, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: FieldPath, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: FieldPath, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: FieldPath, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: FieldPath, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: FieldPath, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lte, value.into())
    }

    /// Matches documents where the string field, or any string element of an array
    /// field, contains `value` ignoring case.
    pub fn contains(field: FieldPath, value: impl Into<String>) -> Expr {
        Expr::field(field, FieldOp::Contains, Bson::String(value.into()))
    }

    /// Matches documents where the string field, or any string element of an array
    /// field, matches the regular expression `pattern` ignoring case.
    pub fn regex(field: FieldPath, pattern: impl Into<String>) -> Expr {
        Expr::field(field, FieldOp::Regex, Bson::String(pattern.into()))
    }

    /// Matches documents where the field equals any of `values`.
    pub fn any_of(field: FieldPath, values: impl IntoIterator<Item = Bson>) -> Expr {
        Expr::field(field, FieldOp::AnyOf, Bson::Array(values.into_iter().collect()))
    }

    /// Combines expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the filter expression only when one is given.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key after any already present.
    pub fn sort(mut self, field: FieldPath, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field, direction });
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &FieldPath,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    #[test]
    fn builder_accumulates_sort_keys_in_order() {
        let query = Query::builder()
            .sort(path("Pages"), SortDirection::Desc)
            .sort(path("Title"), SortDirection::Asc)
            .offset(20)
            .limit(10)
            .build();

        assert_eq!(query.sort.len(), 2);
        assert_eq!(query.sort[0].field, path("Pages"));
        assert_eq!(query.sort[1].direction, SortDirection::Asc);
        assert_eq!(query.offset, Some(20));
        assert_eq!(query.limit, Some(10));
        assert!(query.filter.is_none());
    }

    #[test]
    fn and_or_flatten_when_chained() {
        let expr = Filter::eq(path("a"), 1)
            .and(Filter::eq(path("b"), 2))
            .and(Filter::eq(path("c"), 3));
        assert!(matches!(expr, Expr::And(ref list) if list.len() == 3));

        let expr = Filter::eq(path("a"), 1).or(Filter::eq(path("b"), 2));
        assert!(matches!(expr, Expr::Or(ref list) if list.len() == 2));
    }

    #[test]
    fn text_helpers_carry_string_values() {
        assert_eq!(
            Filter::contains(path("Title"), "dark"),
            Expr::field(path("Title"), FieldOp::Contains, Bson::String("dark".into()))
        );
        assert!(matches!(
            Filter::any_of(path("Rating"), [Bson::Double(4.0)]),
            Expr::Field { op: FieldOp::AnyOf, value: Bson::Array(ref v), .. } if v.len() == 1
        ));
    }
}
