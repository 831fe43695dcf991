use crate::client::{Gateway, GatewayInfo};
use crate::context::Context;
use crate::error::{FlinkError, Result};
use crate::operation::{Operation, OperationStatus};
use crate::result::{ColumnMeta, LogicalType, RawRow, ResultPage, ResultType};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Every call received by a [`ScriptedGateway`], in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    OpenSession(BTreeMap<String, String>),
    CloseSession(String),
    Submit(String),
    Status(String),
    Fetch(Option<String>),
    Cancel(String),
    CloseOperation(String),
    Heartbeat(String),
}

#[derive(Debug, Default)]
struct Script {
    statuses: VecDeque<OperationStatus>,
    status_error: Option<String>,
    pages: VecDeque<std::result::Result<ResultPage, (u16, String)>>,
    open_delay: Duration,
    fail_close_session: bool,
    sessions_opened: usize,
    operations_submitted: usize,
    calls: Vec<Call>,
}

/// In-memory [`Gateway`] that answers from a script.
///
/// Statuses are consumed in order; the last one repeats forever. Pages
/// are consumed in order whatever token is requested, and every requested
/// token is recorded so tests can check the chain.
#[derive(Debug, Default)]
pub(crate) struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn edit(mut self, f: impl FnOnce(&mut Script)) -> Self {
        f(self.script.get_mut().unwrap());
        self
    }

    pub(crate) fn statuses(self, statuses: impl IntoIterator<Item = OperationStatus>) -> Self {
        self.edit(|s| s.statuses.extend(statuses))
    }

    pub(crate) fn status_error(self, message: &str) -> Self {
        self.edit(|s| s.status_error = Some(message.to_string()))
    }

    pub(crate) fn page(self, page: ResultPage) -> Self {
        self.edit(|s| s.pages.push_back(Ok(page)))
    }

    pub(crate) fn fail_page(self, status: u16, body: &str) -> Self {
        self.edit(|s| s.pages.push_back(Err((status, body.to_string()))))
    }

    pub(crate) fn open_delay(self, delay: Duration) -> Self {
        self.edit(|s| s.open_delay = delay)
    }

    pub(crate) fn fail_close_session(self) -> Self {
        self.edit(|s| s.fail_close_session = true)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.script.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    /// Tokens passed to `fetch_result_page`, in call order.
    pub(crate) fn fetched_tokens(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Fetch(token) => Some(token),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn sessions_opened(&self) -> usize {
        self.script.lock().unwrap().sessions_opened
    }

    fn record(&self, call: Call) {
        self.script.lock().unwrap().calls.push(call);
    }
}

fn live(ctx: &Context) -> Result<()> {
    match ctx.err() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn open_session(
        &self,
        ctx: &Context,
        properties: &BTreeMap<String, String>,
    ) -> Result<String> {
        live(ctx)?;
        self.record(Call::OpenSession(properties.clone()));

        let delay = self.script.lock().unwrap().open_delay;
        if !delay.is_zero() {
            ctx.sleep(delay).await?;
        }

        let mut script = self.script.lock().unwrap();
        script.sessions_opened += 1;
        Ok(format!("session-{}", script.sessions_opened))
    }

    async fn close_session(&self, _ctx: &Context, session: &str) -> Result<()> {
        self.record(Call::CloseSession(session.to_string()));
        if self.script.lock().unwrap().fail_close_session {
            return Err(FlinkError::Gateway { status: 500, body: "{\"errors\":[\"boom\"]}".into() });
        }
        Ok(())
    }

    async fn submit_statement(&self, ctx: &Context, _session: &str, sql: &str) -> Result<String> {
        live(ctx)?;
        self.record(Call::Submit(sql.to_string()));
        let mut script = self.script.lock().unwrap();
        script.operations_submitted += 1;
        Ok(format!("operation-{}", script.operations_submitted))
    }

    async fn operation_status(
        &self,
        ctx: &Context,
        session: &str,
        operation: &str,
    ) -> Result<Operation> {
        live(ctx)?;
        self.record(Call::Status(operation.to_string()));

        let mut script = self.script.lock().unwrap();
        let next = if script.statuses.len() > 1 {
            script.statuses.pop_front()
        } else {
            script.statuses.front().copied()
        };
        let status = next.unwrap_or(OperationStatus::Finished);

        Ok(Operation {
            handle: operation.to_string(),
            session_handle: session.to_string(),
            status,
            error_message: match status {
                OperationStatus::Error => script.status_error.clone(),
                _ => None,
            },
        })
    }

    async fn fetch_result_page(
        &self,
        ctx: &Context,
        _session: &str,
        _operation: &str,
        token: Option<&str>,
    ) -> Result<ResultPage> {
        live(ctx)?;
        self.record(Call::Fetch(token.map(str::to_string)));

        match self.script.lock().unwrap().pages.pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err((status, body))) => Err(FlinkError::Gateway { status, body }),
            None => Err(FlinkError::Protocol("no page scripted".to_string())),
        }
    }

    async fn cancel_operation(&self, _ctx: &Context, _session: &str, operation: &str) -> Result<()> {
        self.record(Call::Cancel(operation.to_string()));
        Ok(())
    }

    async fn close_operation(&self, _ctx: &Context, _session: &str, operation: &str) -> Result<()> {
        self.record(Call::CloseOperation(operation.to_string()));
        Ok(())
    }

    async fn heartbeat(&self, ctx: &Context, session: &str) -> Result<()> {
        live(ctx)?;
        self.record(Call::Heartbeat(session.to_string()));
        Ok(())
    }

    async fn info(&self, ctx: &Context) -> Result<GatewayInfo> {
        live(ctx)?;
        Ok(GatewayInfo {
            product_name: "Apache Flink".to_string(),
            version: "1.20.0".to_string(),
        })
    }
}

pub(crate) fn column(name: &str, type_name: &str, nullable: bool) -> ColumnMeta {
    ColumnMeta::new(name, LogicalType::new(type_name, nullable))
}

pub(crate) fn page(
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<JsonValue>>,
    next: Option<&str>,
) -> ResultPage {
    ResultPage {
        result_type: if next.is_some() { ResultType::Payload } else { ResultType::Eos },
        columns,
        rows: rows.into_iter().map(RawRow::new).collect(),
        next_token: next.map(str::to_string),
        ..Default::default()
    }
}

pub(crate) fn not_ready(next: &str) -> ResultPage {
    ResultPage {
        result_type: ResultType::NotReady,
        next_token: Some(next.to_string()),
        ..Default::default()
    }
}
