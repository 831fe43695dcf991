use crate::result::{ColumnMeta, LogicalType, RawRow, ResultPage, ResultType};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;


#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenSessionRequest<'a> {
    pub(crate) properties: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenSessionResponse {
    pub(crate) session_handle: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecuteStatementRequest<'a> {
    pub(crate) statement: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecuteStatementResponse {
    pub(crate) operation_handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OperationStatusResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ColumnInfo {
    pub(crate) name: String,
    pub(crate) logical_type: LogicalType,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

impl From<ColumnInfo> for ColumnMeta {
    fn from(info: ColumnInfo) -> Self {
        let mut column = ColumnMeta::new(&info.name, info.logical_type);
        column.comment = info.comment;
        column
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultSet {
    #[serde(default)]
    pub(crate) columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub(crate) data: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FetchResultsResponse {
    #[serde(default)]
    pub(crate) result_type: ResultType,
    #[serde(default)]
    pub(crate) is_query_result: Option<bool>,
    #[serde(default, rename = "jobID")]
    pub(crate) job_id: Option<String>,
    #[serde(default)]
    pub(crate) result_kind: Option<String>,
    #[serde(default)]
    pub(crate) results: Option<ResultSet>,
    #[serde(default)]
    pub(crate) next_result_uri: Option<String>,
}

impl From<FetchResultsResponse> for ResultPage {
    fn from(resp: FetchResultsResponse) -> Self {
        let results = resp.results.unwrap_or_default();
        let next_token = match resp.result_type {
            ResultType::Eos => None,
            _ => resp.next_result_uri.as_deref().and_then(token_from_uri),
        };

        ResultPage {
            result_type: resp.result_type,
            columns: results.columns.into_iter().map(ColumnMeta::from).collect(),
            rows: results.data,
            next_token,
            job_id: resp.job_id,
            result_kind: resp.result_kind,
            is_query_result: resp.is_query_result,
        }
    }
}

/// Extract the page token from a `nextResultUri` such as
/// `/v3/sessions/<s>/operations/<o>/result/1?rowFormat=JSON`.
pub(crate) fn token_from_uri(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// `GET /{version}/info`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfo {
    pub product_name: String,
    pub version: String,
}
