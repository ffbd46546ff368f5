//! Grid request to store query translation.
//!
//! One [`GridRequest`] becomes three store requests, bundled in [`GridQueries`]:
//!
//! 1. the page query: filters, sort keys, skip and limit;
//! 2. the filtered count: the same filter, no window;
//! 3. the total count: no filter at all.
//!
//! Column searches are combined with AND. The global search is an OR of the same
//! per-field predicate across every searchable field, ANDed with the column searches.
//!
//! Predicates follow the field's declared type:
//!
//! | type | term | predicate |
//! |------|------|-----------|
//! | `text`, `string`, `array` | literal | case-insensitive substring (any element for arrays) |
//! | `text`, `string`, `array` | regex | case-insensitive pattern |
//! | `number` | `n` / `min..max` | equality / inclusive range |
//! | `date` | day / `from..to` | `[start of day, next day)` / whole-day range |
//!
//! A term that does not parse for the field's type yields no predicate for that field.
//! It is skipped, not rejected. Unknown field names, on the other hand, reject the request.

use chrono::{DateTime, NaiveTime, Utc};
use regex::RegexBuilder;
use tracing::debug;

use crate::{
    coerce::{self, parse_date, parse_number},
    error::BridgeResult,
    path::FieldPath,
    query::{Expr, Filter, Query, Sort},
    request::{GridRequest, SearchTerm},
    schema::{FieldSchema, FieldSpec, FieldType},
};

const RANGE_SEPARATOR: &str = "..";

/// A count request: documents matching `filter`, all documents for `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub filter: Option<Expr>,
}

/// The three store requests needed to answer one grid read.
#[derive(Debug, Clone, PartialEq)]
pub struct GridQueries {
    pub page: Query,
    pub filtered: CountQuery,
    pub total: CountQuery,
}

/// Builds store queries from grid requests for one schema.
#[derive(Debug, Clone, Copy)]
pub struct QueryTranslator<'s> {
    schema: &'s FieldSchema,
}

impl<'s> QueryTranslator<'s> {
    pub fn new(schema: &'s FieldSchema) -> Self {
        Self { schema }
    }

    pub fn translate(&self, request: &GridRequest) -> BridgeResult<GridQueries> {
        let filter = self.filter(request)?;
        let sort = self.sort(request)?;

        let mut page = Query::builder()
            .maybe_filter(filter.clone())
            .build();
        page.sort = sort;
        if request.start > 0 {
            page.offset = Some(request.start);
        }
        page.limit = request.length.limit();

        debug!(?page, "translated grid request");

        Ok(GridQueries {
            page,
            filtered: CountQuery { filter },
            total: CountQuery { filter: None },
        })
    }

    /// The combined filter of the column searches and the global search.
    pub fn filter(&self, request: &GridRequest) -> BridgeResult<Option<Expr>> {
        let mut clauses = Vec::new();

        for (name, term) in &request.column_searches {
            if term.is_blank() {
                continue;
            }

            let field = self.schema.require(name)?;
            match field_predicate(field, term) {
                Some(predicate) => clauses.push(predicate),
                None => debug!(field = %field.path(), term = %term.value, "ignoring unusable column search"),
            }
        }

        if let Some(term) = request.global_search.as_ref().filter(|term| !term.is_blank()) {
            let excluded = request
                .global_exclude
                .iter()
                .filter_map(|name| self.schema.resolve(name))
                .map(FieldSpec::path)
                .collect::<Vec<_>>();

            let alternatives = self
                .schema
                .searchable()
                .filter(|field| !excluded.contains(&field.path()))
                .filter_map(|field| field_predicate(field, term))
                .collect::<Vec<_>>();

            if alternatives.is_empty() {
                debug!(term = %term.value, "global search matches no searchable field");
            } else {
                clauses.push(Filter::or(alternatives));
            }
        }

        Ok(match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Filter::and(clauses)),
        })
    }

    /// Sort keys in request order, resolved to document paths.
    pub fn sort(&self, request: &GridRequest) -> BridgeResult<Vec<Sort>> {
        request
            .sort
            .iter()
            .map(|(name, direction)| {
                Ok(Sort {
                    field: self.schema.require(name)?.path().clone(),
                    direction: *direction,
                })
            })
            .collect()
    }
}

/// Builds the predicate `term` implies for `field`, if it implies one.
pub fn field_predicate(field: &FieldSpec, term: &SearchTerm) -> Option<Expr> {
    let value = term.trimmed();
    if value.is_empty() {
        return None;
    }

    let path = field.path().clone();

    match field.field_type() {
        FieldType::Text | FieldType::String | FieldType::Array => text_predicate(path, value, term.regex),
        FieldType::Number => number_predicate(path, value),
        FieldType::Date => date_predicate(path, value),
    }
}

fn text_predicate(path: FieldPath, value: &str, regex: bool) -> Option<Expr> {
    if !regex {
        return Some(Filter::contains(path, value));
    }

    match RegexBuilder::new(value).case_insensitive(true).build() {
        Ok(_) => Some(Filter::regex(path, value)),
        Err(_) => None,
    }
}

fn number_predicate(path: FieldPath, value: &str) -> Option<Expr> {
    let Some((low, high)) = value.split_once(RANGE_SEPARATOR) else {
        return parse_number(value)
            .ok()
            .map(|n| Filter::eq(path, n));
    };

    let low = parse_bound(low, parse_number)?;
    let high = parse_bound(high, parse_number)?;

    range(path, low, high)
}

fn date_predicate(path: FieldPath, value: &str) -> Option<Expr> {
    let Some((low, high)) = value.split_once(RANGE_SEPARATOR) else {
        let day = start_of_day(parse_date(value).ok()?);
        let next = next_day(day)?;

        return range_exclusive(path, day, next);
    };

    let low = parse_bound(low, parse_date)?.map(start_of_day);
    let high = match parse_bound(high, parse_date)? {
        Some(day) => Some(next_day(start_of_day(day))?),
        None => None,
    };

    match (low, high) {
        (None, None) => None,
        (Some(low), None) => Some(Filter::gte(path, coerce::to_bson_datetime(low))),
        (None, Some(high)) => Some(Filter::lt(path, coerce::to_bson_datetime(high))),
        (Some(low), Some(high)) => range_exclusive(path, low, high),
    }
}

/// Parses one side of a range. `Some(None)` is an open bound, `None` a bad one.
fn parse_bound<T, E>(bound: &str, parse: impl Fn(&str) -> Result<T, E>) -> Option<Option<T>> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Some(None);
    }

    parse(bound).ok().map(Some)
}

fn range(path: FieldPath, low: Option<bson::Bson>, high: Option<bson::Bson>) -> Option<Expr> {
    match (low, high) {
        (None, None) => None,
        (Some(low), None) => Some(Filter::gte(path, low)),
        (None, Some(high)) => Some(Filter::lte(path, high)),
        (Some(low), Some(high)) => Some(Filter::and([Filter::gte(path.clone(), low), Filter::lte(path, high)])),
    }
}

fn range_exclusive(path: FieldPath, low: DateTime<Utc>, high: DateTime<Utc>) -> Option<Expr> {
    Some(Filter::and([
        Filter::gte(path.clone(), coerce::to_bson_datetime(low)),
        Filter::lt(path, coerce::to_bson_datetime(high)),
    ]))
}

fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn next_day(day: DateTime<Utc>) -> Option<DateTime<Utc>> {
    day.date_naive()
        .succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN).and_utc())
}
