// {
//   "command": "query",
//   "status": "success",
//   "data": {
//     "columns": [{"name": "id", "type": "BIGINT NOT NULL"}],
//     "rows": [{"kind": "+I", "values": [1]}]
//   },
//   "error": null
// }
use flink_sql_gateway::{FlinkError, GatewayInfo, Row, Value};
use serde::Serialize;
use serde_json::Value as JsonValue;


#[derive(Serialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum CliErrorJson {
    Connection(String),
    Gateway(String),
    OperationFailed(String),
    Canceled(String),
    Decode(String),
    Config(String),
    Protocol(String),
}

impl From<&FlinkError> for CliErrorJson {
    fn from(e: &FlinkError) -> Self {
        let message = e.to_string();

        match e {
            FlinkError::Connection(_) => Self::Connection(message),
            FlinkError::Gateway { .. } => Self::Gateway(message),
            FlinkError::OperationFailed(_) => Self::OperationFailed(message),
            FlinkError::OperationCanceled
            | FlinkError::ContextCanceled
            | FlinkError::DeadlineExceeded => Self::Canceled(message),
            FlinkError::Decode { .. } => Self::Decode(message),
            FlinkError::Config(_) => Self::Config(message),
            _ => Self::Protocol(message),
        }
    }
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Serialize)]
pub struct RowJson {
    pub kind: &'static str,
    pub values: Vec<JsonValue>,
}

impl From<Row> for RowJson {
    fn from(row: Row) -> Self {
        Self {
            kind: row.kind().as_str(),
            values: row.into_values().iter().map(value_to_json).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct QueryData {
    pub columns: Vec<ColumnJson>,
    pub rows: Vec<RowJson>,
    /// Set when `--limit` stopped the cursor before the end of the result.
    pub truncated: bool,
}

#[derive(Serialize)]
pub struct ExecData {
    pub operation_handle: String,
    pub job_id: Option<String>,
    pub result_kind: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum CommandData {
    Query(QueryData),
    Exec(ExecData),
    Info(GatewayInfo),
}

#[derive(Serialize, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum CliStatus {
    Success,
    Error,
}

#[derive(Serialize)]
pub struct CliOutput {
    pub command: String,
    pub status: CliStatus,
    pub data: Option<CommandData>,
    pub error: Option<CliErrorJson>,
    /// Human readable error, kept out of the JSON document.
    #[serde(skip)]
    pub message: Option<String>,
}

impl CliOutput {
    pub fn new(command: String, result: Result<CommandData, FlinkError>) -> Self {
        match result {
            Ok(data) => Self {
                command,
                status: CliStatus::Success,
                data: Some(data),
                error: None,
                message: None,
            },
            Err(e) => Self {
                command,
                status: CliStatus::Error,
                data: None,
                error: Some(CliErrorJson::from(&e)),
                message: Some(e.to_string()),
            },
        }
    }
}

/// JSON rendering of a decoded cell. Bytes become lowercase hex; non-finite
/// floats become strings since JSON has no literal for them.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Int(v) => JsonValue::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string())),
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::String(v) => JsonValue::String(v.clone()),
        Value::Bytes(v) => JsonValue::String(v.iter().map(|b| format!("{b:02x}")).collect()),
        Value::Timestamp(v) => JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    }
}
