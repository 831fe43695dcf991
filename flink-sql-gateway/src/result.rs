//! Result pages as returned by the gateway.
//!
//! A [`ResultPage`] is immutable once fetched. Its rows stay in wire form
//! ([`RawRow`]) until the cursor decodes them one at a time.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;


/// The declared type of a result column, as described by the gateway's
/// `logicalType` object.
///
/// Only the type family name is interpreted; parameters such as `length`,
/// `precision` or nested `fields` are kept untouched in `params`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogicalType {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(flatten)]
    pub params: Map<String, JsonValue>,
}

fn default_nullable() -> bool {
    true
}

impl LogicalType {
    pub fn new(name: &str, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            nullable,
            params: Map::new(),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Metadata of one result column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub remote_type: LogicalType,
    pub nullable: bool,
    pub comment: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: &str, remote_type: LogicalType) -> Self {
        let nullable = remote_type.nullable;
        Self {
            name: name.to_string(),
            remote_type,
            nullable,
            comment: None,
        }
    }

    /// Name of the remote type family, e.g. `INTEGER` or `ROW`.
    pub fn type_name(&self) -> &str {
        &self.remote_type.name
    }
}

/// Changelog kind of a row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowKind {
    #[default]
    Insert,
    UpdateBefore,
    UpdateAfter,
    Delete,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Insert => "+I",
            RowKind::UpdateBefore => "-U",
            RowKind::UpdateAfter => "+U",
            RowKind::Delete => "-D",
        }
    }
}

/// One row in wire form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub kind: RowKind,
    #[serde(default)]
    pub fields: Vec<JsonValue>,
}

impl RawRow {
    pub fn new(fields: Vec<JsonValue>) -> Self {
        Self { kind: RowKind::Insert, fields }
    }
}

/// Whether a page carries data, or the result is not ready yet, or the stream ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    NotReady,
    #[default]
    Payload,
    Eos,
}

/// One page of a result set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultPage {
    pub result_type: ResultType,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<RawRow>,
    /// Token of the following page; `None` on the last page.
    pub next_token: Option<String>,
    pub job_id: Option<String>,
    pub result_kind: Option<String>,
    pub is_query_result: Option<bool>,
}

impl ResultPage {
    /// True when no further page follows this one.
    pub fn is_last(&self) -> bool {
        self.result_type == ResultType::Eos || self.next_token.is_none()
    }
}
