//! Grid read requests and responses, independent of any wire format.
//!
//! Fields are referenced by the names clients use: a field's alias or its dotted path.
//! The [`QueryTranslator`](crate::translate::QueryTranslator) resolves those names against
//! the schema.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{BridgeError, BridgeResult},
    query::SortDirection,
};

/// A projected row: reserved row id first, then fields in schema order.
pub type Row = Map<String, Value>;

/// How many rows a page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLength {
    /// At most this many rows, never zero.
    Rows(usize),
    /// Every row after `start`. The only unbounded read.
    All,
}

impl PageLength {
    /// The wire sentinel for [`PageLength::All`].
    pub const ALL_SENTINEL: i64 = -1;

    /// Interprets a wire page length: `-1` is all, positive values are a row count.
    pub fn from_wire(length: i64) -> BridgeResult<Self> {
        match length {
            Self::ALL_SENTINEL => Ok(PageLength::All),
            n if n >= 1 => usize::try_from(n)
                .map(PageLength::Rows)
                .map_err(|_| BridgeError::Validation(format!("page length {n} is too large"))),
            n => Err(BridgeError::Validation(format!("invalid page length {n}"))),
        }
    }

    pub fn limit(self) -> Option<usize> {
        match self {
            PageLength::Rows(n) => Some(n),
            PageLength::All => None,
        }
    }
}

impl Default for PageLength {
    fn default() -> Self {
        PageLength::Rows(10)
    }
}

/// A search term typed into the global or a column search box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub value: String,
    /// Treat `value` as a regular expression instead of a literal substring.
    pub regex: bool,
}

impl SearchTerm {
    pub fn literal(value: impl Into<String>) -> Self {
        Self { value: value.into(), regex: false }
    }

    pub fn regex(value: impl Into<String>) -> Self {
        Self { value: value.into(), regex: true }
    }

    /// The term with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }
}

/// One server-side grid read.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    /// Echo token, returned unchanged.
    pub draw: u64,
    /// Rows to skip.
    pub start: usize,
    pub length: PageLength,
    pub global_search: Option<SearchTerm>,
    /// Fields left out of the global search for this request only.
    pub global_exclude: Vec<String>,
    /// Per-column searches as `(field name, term)`.
    pub column_searches: Vec<(String, SearchTerm)>,
    /// Sort keys as `(field name, direction)`, primary first.
    pub sort: Vec<(String, SortDirection)>,
}

impl Default for GridRequest {
    fn default() -> Self {
        Self {
            draw: 1,
            start: 0,
            length: PageLength::default(),
            global_search: None,
            global_exclude: Vec::new(),
            column_searches: Vec::new(),
            sort: Vec::new(),
        }
    }
}

impl GridRequest {
    pub fn builder() -> GridRequestBuilder {
        GridRequestBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridRequestBuilder {
    request: GridRequest,
}

impl GridRequestBuilder {
    pub fn draw(mut self, draw: u64) -> Self {
        self.request.draw = draw;
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.request.start = start;
        self
    }

    pub fn length(mut self, length: PageLength) -> Self {
        self.request.length = length;
        self
    }

    pub fn search(mut self, term: SearchTerm) -> Self {
        self.request.global_search = Some(term);
        self
    }

    pub fn exclude_from_search(mut self, field: impl Into<String>) -> Self {
        self.request.global_exclude.push(field.into());
        self
    }

    pub fn column_search(mut self, field: impl Into<String>, term: SearchTerm) -> Self {
        self.request.column_searches.push((field.into(), term));
        self
    }

    /// Appends a sort key after any already present.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.request.sort.push((field.into(), direction));
        self
    }

    pub fn build(self) -> GridRequest {
        self.request
    }
}

/// One page of rows plus both counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
    pub draw: u64,
    /// Documents in the collection, ignoring every filter.
    pub records_total: u64,
    /// Documents matching the request's filters.
    pub records_filtered: u64,
    pub data: Vec<Row>,
}
