//! Conversions between wire values and store values.
//!
//! The grid and editor speak JSON primitives (mostly strings). Documents in the store
//! hold typed BSON. The declared [`FieldType`] of a field decides how a value crosses
//! the boundary in either direction:
//!
//! | type | wire → store | store → wire |
//! |------|--------------|--------------|
//! | `number` | integer → `Int64`, float → `Double` | JSON number |
//! | `date` | ISO date / RFC 3339 / `MM/DD/YYYY` → `DateTime` | `YYYY-MM-DD` or RFC 3339 |
//! | `array` | comma list or JSON array → array of strings | JSON array |
//! | `text`, `string` | trimmed string | string |
//!
//! Wire `null` maps to store `Null` (and back) for every type.

use bson::{Bson, DateTime as BsonDateTime};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::schema::FieldType;

/// Input format conventionally used by grid date pickers.
pub const GRID_DATE_FORMAT: &str = "%m/%d/%Y";

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A wire value that cannot be converted to its declared type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("{0:?} is not a valid number")]
    InvalidNumber(String),
    #[error("{0:?} is not a valid date")]
    InvalidDate(String),
    #[error("array elements must be scalar values")]
    InvalidArray,
    #[error("expected a text value")]
    InvalidText,
    #[error("{0:?} may not contain '.'")]
    DelimiterInKey(String),
}

/// Converts a wire value into the store representation of `field_type`.
pub fn to_store_value(field_type: FieldType, value: &Value) -> Result<Bson, CoercionError> {
    if value.is_null() {
        return Ok(Bson::Null);
    }

    match field_type {
        FieldType::Number => number_to_store(value),
        FieldType::Date => date_to_store(value),
        FieldType::Array => array_to_store(value),
        FieldType::Text | FieldType::String => text_to_store(value),
    }
}

/// Converts a stored value into the wire representation of `field_type`.
///
/// Values whose stored type does not match the declared type are rendered as-is.
pub fn to_wire_value(field_type: FieldType, value: &Bson) -> Value {
    match (field_type, value) {
        (_, Bson::Null) => Value::Null,
        (FieldType::Number, Bson::String(s)) => parse_number(s)
            .map(|n| bson_to_json(&n))
            .unwrap_or_else(|_| Value::String(s.clone())),
        (FieldType::Date, Bson::DateTime(dt)) => Value::String(render_date(*dt)),
        (FieldType::Array, Bson::Array(items)) => Value::Array(
            items
                .iter()
                .map(scalar_to_wire_string)
                .collect(),
        ),
        (FieldType::Text | FieldType::String, Bson::String(s)) => Value::String(s.clone()),
        _ => bson_to_json(value),
    }
}

/// Parses a number the way the grid submits it: integer first, then finite float.
pub fn parse_number(input: &str) -> Result<Bson, CoercionError> {
    let trimmed = input.trim();

    if let Ok(integer) = trimmed.parse::<i64>() {
        return Ok(Bson::Int64(integer));
    }

    match trimmed.parse::<f64>() {
        Ok(float) if float.is_finite() => Ok(Bson::Double(float)),
        _ => Err(CoercionError::InvalidNumber(input.to_string())),
    }
}

/// Parses a date in any accepted wire format, returning the UTC instant.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, CoercionError> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, ISO_DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, GRID_DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(CoercionError::InvalidDate(input.to_string()))
}

/// Converts a chrono instant into a BSON timestamp.
pub fn to_bson_datetime(instant: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(instant.timestamp_millis())
}

fn number_to_store(value: &Value) -> Result<Bson, CoercionError> {
    match value {
        Value::Number(n) => {
            if let Some(integer) = n.as_i64() {
                Ok(Bson::Int64(integer))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(Bson::Double)
                    .ok_or_else(|| CoercionError::InvalidNumber(n.to_string()))
            }
        }
        Value::String(s) => parse_number(s),
        other => Err(CoercionError::InvalidNumber(other.to_string())),
    }
}

fn date_to_store(value: &Value) -> Result<Bson, CoercionError> {
    match value {
        Value::String(s) => Ok(Bson::DateTime(to_bson_datetime(parse_date(s)?))),
        other => Err(CoercionError::InvalidDate(other.to_string())),
    }
}

fn array_to_store(value: &Value) -> Result<Bson, CoercionError> {
    let items = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Bson::String(item.to_string()))
            .collect(),
        Value::Array(values) => {
            let mut items = Vec::with_capacity(values.len());

            for item in values {
                let rendered = match item {
                    Value::Null => continue,
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Array(_) | Value::Object(_) => return Err(CoercionError::InvalidArray),
                };

                if !rendered.is_empty() {
                    items.push(Bson::String(rendered));
                }
            }

            items
        }
        Value::Number(n) => vec![Bson::String(n.to_string())],
        Value::Bool(b) => vec![Bson::String(b.to_string())],
        Value::Null | Value::Object(_) => return Err(CoercionError::InvalidArray),
    };

    Ok(Bson::Array(items))
}

fn text_to_store(value: &Value) -> Result<Bson, CoercionError> {
    match value {
        Value::String(s) => Ok(Bson::String(s.trim().to_string())),
        Value::Number(n) => Ok(Bson::String(n.to_string())),
        Value::Bool(b) => Ok(Bson::String(b.to_string())),
        _ => Err(CoercionError::InvalidText),
    }
}

fn render_date(value: BsonDateTime) -> String {
    let Some(instant) = DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis()) else {
        return value.timestamp_millis().to_string();
    };

    if instant.time() == NaiveTime::MIN {
        instant.format(ISO_DATE_FORMAT).to_string()
    } else {
        instant.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn scalar_to_wire_string(value: &Bson) -> Value {
    match value {
        Bson::String(s) => Value::String(s.clone()),
        other => bson_to_json(other),
    }
}

/// Generic BSON to JSON conversion for values without a more specific rendering.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(n) => Value::from(*n),
        Bson::Int64(n) => Value::from(*n),
        Bson::Double(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(render_date(*dt)),
        Bson::Array(items) => Value::Array(
            items
                .iter()
                .map(bson_to_json)
                .collect(),
        ),
        Bson::Document(document) => Value::Object(
            document
                .iter()
                .map(|(k, v)| (k.clone(), bson_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        other => Value::String(other.to_string()),
    }
}
