//! Decoding of wire cells into native values.
//!
//! Cells arrive as JSON. Each one is mapped according to the declared type
//! of its column:
//!
//! | remote type                                   | [`Value`]              |
//! |-----------------------------------------------|------------------------|
//! | `TINYINT` .. `BIGINT`, `INTERVAL_*`           | [`Value::Int`]         |
//! | `FLOAT`, `DOUBLE`                             | [`Value::Float`]       |
//! | `BOOLEAN`                                     | [`Value::Bool`]        |
//! | `CHAR`, `VARCHAR`, `DECIMAL`                  | [`Value::String`]      |
//! | `DATE`, `TIME_*`, `TIMESTAMP_*`               | [`Value::Timestamp`]   |
//! | `BINARY`, `VARBINARY`                         | [`Value::Bytes`]       |
//! | `ROW`, `MAP`, `ARRAY`, `MULTISET`, ...        | [`Value::Bytes`] (JSON)|
//!
//! Structured values are not typed recursively: their bytes are the compact
//! JSON text of the cell, to be decoded by the caller.
use crate::error::{FlinkError, Result};
use crate::result::{ColumnMeta, RawRow};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;
use std::fmt;


/// A decoded cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => match std::str::from_utf8(v) {
                Ok(text) => f.write_str(text),
                Err(_) => write!(f, "x'{}'", v.iter().map(|b| format!("{b:02x}")).collect::<String>()),
            },
            Value::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Temporal {
    Date,
    Time,
    Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TypeFamily {
    Integer,
    Float,
    Boolean,
    Character,
    Decimal,
    Temporal(Temporal),
    Binary,
    Structured,
    Null,
}

impl TypeFamily {
    fn of(type_name: &str) -> Option<Self> {
        let family = match type_name.to_ascii_uppercase().as_str() {
            "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT"
            | "INTERVAL_YEAR_MONTH" | "INTERVAL_DAY_TIME" => TypeFamily::Integer,
            "FLOAT" | "DOUBLE" => TypeFamily::Float,
            "BOOLEAN" => TypeFamily::Boolean,
            "CHAR" | "VARCHAR" => TypeFamily::Character,
            "DECIMAL" => TypeFamily::Decimal,
            "DATE" => TypeFamily::Temporal(Temporal::Date),
            "TIME_WITHOUT_TIME_ZONE" | "TIME" => TypeFamily::Temporal(Temporal::Time),
            "TIMESTAMP_WITHOUT_TIME_ZONE" | "TIMESTAMP_WITH_TIME_ZONE"
            | "TIMESTAMP_WITH_LOCAL_TIME_ZONE" | "TIMESTAMP" | "TIMESTAMP_LTZ" => {
                TypeFamily::Temporal(Temporal::Timestamp)
            }
            "BINARY" | "VARBINARY" => TypeFamily::Binary,
            "ROW" | "MAP" | "ARRAY" | "MULTISET" | "STRUCTURED_TYPE" | "DISTINCT_TYPE" | "RAW" => {
                TypeFamily::Structured
            }
            "NULL" => TypeFamily::Null,
            _ => return None,
        };
        Some(family)
    }
}

/// Decode one cell according to its column.
///
/// A JSON `null` is [`Value::Null`] on a nullable column and an error on a
/// non-nullable one.
pub fn decode_value(cell: &JsonValue, column: &ColumnMeta) -> Result<Value> {
    let type_name = column.type_name();
    let fail = |cause: String| FlinkError::decode(&column.name, type_name, cause);

    if cell.is_null() {
        if column.nullable || TypeFamily::of(type_name) == Some(TypeFamily::Null) {
            return Ok(Value::Null);
        }
        return Err(fail("null value in a non-nullable column".to_string()));
    }

    let family = TypeFamily::of(type_name).ok_or_else(|| fail("unrecognized remote type".to_string()))?;

    match family {
        TypeFamily::Integer => decode_integer(cell).map(Value::Int).map_err(fail),
        TypeFamily::Float => decode_float(cell).map(Value::Float).map_err(fail),
        TypeFamily::Boolean => match cell {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            other => Err(fail(format!("expected a boolean, found {}", other))),
        },
        TypeFamily::Character => match cell {
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            other => Err(fail(format!("expected a string, found {}", other))),
        },
        TypeFamily::Decimal => match cell {
            JsonValue::Number(n) => Ok(Value::String(n.to_string())),
            JsonValue::String(s) if is_decimal(s) => Ok(Value::String(s.clone())),
            other => Err(fail(format!("expected a decimal, found {}", other))),
        },
        TypeFamily::Temporal(kind) => decode_temporal(cell, kind).map(Value::Timestamp).map_err(fail),
        TypeFamily::Binary => match cell {
            JsonValue::String(s) => BASE64
                .decode(s)
                .map(Value::Bytes)
                .map_err(|e| fail(format!("invalid base64: {}", e))),
            other => Err(fail(format!("expected base64 text, found {}", other))),
        },
        TypeFamily::Structured => serde_json::to_vec(cell)
            .map(Value::Bytes)
            .map_err(|e| fail(e.to_string())),
        TypeFamily::Null => Err(fail(format!("expected null, found {}", cell))),
    }
}

/// Decode a whole row. The row must have exactly one field per column.
pub fn decode_row(row: &RawRow, columns: &[ColumnMeta]) -> Result<Vec<Value>> {
    if row.fields.len() != columns.len() {
        return Err(FlinkError::decode(
            "<row>",
            "ROW",
            format!("expected {} fields, found {}", columns.len(), row.fields.len()),
        ));
    }

    row.fields
        .iter()
        .zip(columns)
        .map(|(cell, column)| decode_value(cell, column))
        .collect()
}

fn decode_integer(cell: &JsonValue) -> std::result::Result<i64, String> {
    match cell {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("{} is not a 64-bit integer", n)),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("'{}': {}", s, e)),
        other => Err(format!("expected an integer, found {}", other)),
    }
}

fn decode_float(cell: &JsonValue) -> std::result::Result<f64, String> {
    match cell {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not a float", n)),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{}': {}", s, e)),
        other => Err(format!("expected a float, found {}", other)),
    }
}

fn is_decimal(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

fn decode_temporal(cell: &JsonValue, kind: Temporal) -> std::result::Result<NaiveDateTime, String> {
    let text = match cell {
        JsonValue::String(s) => s.trim(),
        JsonValue::Number(n) => return temporal_from_number(n, kind),
        other => return Err(format!("expected a temporal string, found {}", other)),
    };

    let parsed = match kind {
        Temporal::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        Temporal::Time => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .ok()
            .map(|t| NaiveDate::default().and_time(t)),
        Temporal::Timestamp => parse_timestamp(text),
    };

    parsed.ok_or_else(|| format!("'{}' is not a valid {:?}", text, kind))
}

/// Accepts `2024-05-01 12:00:00.123456789`, the `T`-separated form, and
/// `Z`/offset-suffixed values, which are normalized to UTC.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let normalized = text.replacen(' ', "T", 1);

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(with_offset.naive_utc());
    }
    let local = normalized.strip_suffix('Z').unwrap_or(&normalized);

    NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Numeric temporal cells: days since epoch for `DATE`, milliseconds of day
/// for `TIME`, milliseconds since epoch for timestamps.
fn temporal_from_number(n: &serde_json::Number, kind: Temporal) -> std::result::Result<NaiveDateTime, String> {
    let value = n.as_i64().ok_or_else(|| format!("{} is not an integer", n))?;
    let epoch = NaiveDate::default().and_hms_opt(0, 0, 0).unwrap_or_default();

    let parsed = match kind {
        Temporal::Date => chrono::TimeDelta::try_days(value).and_then(|d| epoch.checked_add_signed(d)),
        Temporal::Time | Temporal::Timestamp => {
            chrono::TimeDelta::try_milliseconds(value).and_then(|d| epoch.checked_add_signed(d))
        }
    };
    parsed.ok_or_else(|| format!("{} is out of range", value))
}
