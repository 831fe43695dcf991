//! The row cursor handed out by [`Connection::query`](crate::Connection::query).
use crate::context::Context;
use crate::error::{FlinkError, Result};
use crate::operation::{cancel_best_effort, close_best_effort};
use crate::pager::ResultPager;
use crate::result::{ColumnMeta, RawRow, ResultPage, RowKind};
use crate::value::{Value, decode_row};

use std::collections::VecDeque;


/// A decoded row.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    kind: RowKind,
    values: Vec<Value>,
}

impl Row {
    pub fn kind(&self) -> RowKind {
        self.kind
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    Open,
    Exhausted,
    Closed,
}

/// Forward-only cursor over the rows of one result.
///
/// Only the current page is held in memory, and its rows are decoded one at
/// a time as [`next`](Rows::next) reaches them. When the page runs out the
/// next one is fetched under the context passed to `next`.
#[derive(Debug)]
pub struct Rows {
    pager: ResultPager,
    columns: Vec<ColumnMeta>,
    buffer: VecDeque<RawRow>,
    state: CursorState,
    job_id: Option<String>,
    result_kind: Option<String>,
    released: bool,
}

impl Rows {
    /// Fetch pages until the column list is known.
    ///
    /// Results that are not ready yet arrive as pages without columns; rows
    /// of the first page that has them are kept for iteration.
    pub(crate) async fn open(ctx: &Context, pager: ResultPager) -> Result<Self> {
        let mut rows = Self {
            pager,
            columns: vec![],
            buffer: VecDeque::new(),
            state: CursorState::Open,
            job_id: None,
            result_kind: None,
            released: false,
        };

        while rows.columns.is_empty() {
            let absorbed = match rows.pager.next_page(ctx).await {
                Ok(Some(page)) => rows.absorb(page),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            if let Err(e) = absorbed {
                rows.fail(&e).await;
                return Err(e);
            }
        }

        if rows.pager.is_done() && rows.buffer.is_empty() {
            rows.exhaust().await;
        }
        Ok(rows)
    }

    /// Column metadata; fixed for the whole result.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn operation_handle(&self) -> &str {
        self.pager.operation()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn result_kind(&self) -> Option<&str> {
        self.result_kind.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Advance to the next row.
    ///
    /// Returns `None` once the result is exhausted, and
    /// [`FlinkError::CursorClosed`] after [`close`](Rows::close). A failed
    /// page fetch or a row that cannot be decoded ends the iteration; rows
    /// returned before it stay valid.
    pub async fn next(&mut self, ctx: &Context) -> Result<Option<Row>> {
        loop {
            match self.state {
                CursorState::Closed => return Err(FlinkError::CursorClosed),
                CursorState::Exhausted => return Ok(None),
                CursorState::Open => {}
            }

            if let Some(raw) = self.buffer.pop_front() {
                return match decode_row(&raw, &self.columns) {
                    Ok(values) => Ok(Some(Row { kind: raw.kind, values })),
                    Err(e) => {
                        self.fail(&e).await;
                        Err(e)
                    }
                };
            }

            let absorbed = match self.pager.next_page(ctx).await {
                Ok(Some(page)) => self.absorb(page),
                Ok(None) => {
                    self.exhaust().await;
                    return Ok(None);
                }
                Err(e) => Err(e),
            };
            if let Err(e) = absorbed {
                self.fail(&e).await;
                return Err(e);
            }
        }
    }

    /// Drain the remaining rows.
    pub async fn collect_all(&mut self, ctx: &Context) -> Result<Vec<Vec<Value>>> {
        let mut all = vec![];
        while let Some(row) = self.next(ctx).await? {
            all.push(row.into_values());
        }
        Ok(all)
    }

    /// Drop buffered rows and release the operation on the gateway.
    ///
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.state = CursorState::Closed;
        self.buffer = VecDeque::new();
        self.pager.finish();
        self.release().await;
    }

    fn absorb(&mut self, page: ResultPage) -> Result<()> {
        if !page.columns.is_empty() {
            if self.columns.is_empty() {
                self.columns = page.columns;
            } else if !same_columns(&self.columns, &page.columns) {
                return Err(FlinkError::Protocol(format!(
                    "Column list of operation {} changed between pages",
                    self.pager.operation()
                )));
            }
        }
        if page.job_id.is_some() {
            self.job_id = page.job_id;
        }
        if page.result_kind.is_some() {
            self.result_kind = page.result_kind;
        }
        self.buffer.extend(page.rows);
        Ok(())
    }

    async fn exhaust(&mut self) {
        self.state = CursorState::Exhausted;
        self.release().await;
    }

    /// End the iteration after `error`; the operation is cancelled if the
    /// caller gave up, and released either way.
    async fn fail(&mut self, error: &FlinkError) {
        self.state = CursorState::Exhausted;
        self.buffer.clear();
        self.pager.finish();
        if error.is_cancellation() {
            cancel_best_effort(
                self.pager.gateway().as_ref(),
                self.pager.poll_config(),
                self.pager.session(),
                self.pager.operation(),
            )
            .await;
        }
        self.release().await;
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        close_best_effort(
            self.pager.gateway().as_ref(),
            self.pager.session(),
            self.pager.operation(),
        )
        .await;
    }
}

fn same_columns(a: &[ColumnMeta], b: &[ColumnMeta]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.name == y.name && x.type_name() == y.type_name())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::PollConfig;
    use crate::test_utils::{Call, ScriptedGateway, column, not_ready, page};
    use serde_json::json;
    use std::sync::Arc;

    async fn open(gateway: ScriptedGateway) -> (Arc<ScriptedGateway>, Result<Rows>) {
        let gateway = Arc::new(gateway);
        let pager = ResultPager::new(gateway.clone(), "s", "operation-1", PollConfig::default());
        let rows = Rows::open(&Context::background(), pager).await;
        (gateway, rows)
    }

    #[tokio::test]
    async fn rows_span_pages_lazily() {
        let columns = vec![column("id", "BIGINT", false), column("name", "VARCHAR", true)];
        let (gateway, rows) = open(
            ScriptedGateway::new()
                .page(page(columns.clone(), vec![vec![json!(1), json!("a")]], Some("1")))
                .page(page(columns.clone(), vec![], Some("2")))
                .page(page(columns, vec![vec![json!(2), json!(null)]], None)),
        )
        .await;
        let mut rows = rows.unwrap();
        let ctx = Context::background();

        assert_eq!(rows.column_names(), vec!["id", "name"]);
        // Only the first page is fetched until the cursor needs more.
        assert_eq!(gateway.fetched_tokens().len(), 1);

        let first = rows.next(&ctx).await.unwrap().unwrap();
        assert_eq!(first.values(), &[Value::Int(1), Value::String("a".into())]);

        let second = rows.next(&ctx).await.unwrap().unwrap();
        assert_eq!(second.values(), &[Value::Int(2), Value::Null]);

        assert!(rows.next(&ctx).await.unwrap().is_none());
        assert!(rows.next(&ctx).await.unwrap().is_none());
        assert_eq!(gateway.fetched_tokens().len(), 3);
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn columns_are_taken_from_first_page_that_has_them() {
        let columns = vec![column("n", "INTEGER", false)];
        let (_, rows) = open(
            ScriptedGateway::new()
                .page(not_ready("0"))
                .page(page(columns, vec![vec![json!(5)]], None)),
        )
        .await;
        let mut rows = rows.unwrap();

        assert_eq!(rows.columns().len(), 1);
        let all = rows.collect_all(&Context::background()).await.unwrap();
        assert_eq!(all, vec![vec![Value::Int(5)]]);
    }

    #[tokio::test]
    async fn closed_cursor_rejects_next() {
        let columns = vec![column("n", "INTEGER", false)];
        let (gateway, rows) = open(
            ScriptedGateway::new().page(page(columns, vec![vec![json!(1)], vec![json!(2)]], Some("1"))),
        )
        .await;
        let mut rows = rows.unwrap();

        rows.close().await;
        rows.close().await;

        assert!(rows.is_closed());
        assert!(matches!(
            rows.next(&Context::background()).await,
            Err(FlinkError::CursorClosed)
        ));
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    }

    #[tokio::test]
    async fn undecodable_row_ends_iteration_and_releases() {
        let columns = vec![column("a", "INTEGER", false)];
        let (gateway, rows) = open(
            ScriptedGateway::new().page(page(columns, vec![vec![json!("x")], vec![json!(2)]], None)),
        )
        .await;
        let mut rows = rows.unwrap();
        let ctx = Context::background();

        assert!(matches!(rows.next(&ctx).await, Err(FlinkError::Decode { .. })));
        assert!(rows.next(&ctx).await.unwrap().is_none());
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
        assert_eq!(gateway.count(|c| matches!(c, Call::Cancel(_))), 0);
    }

    #[tokio::test]
    async fn short_row_fails_decode() {
        let columns = vec![column("a", "INTEGER", false), column("b", "INTEGER", false)];
        let (_, rows) = open(
            ScriptedGateway::new().page(page(columns, vec![vec![json!(1)], vec![json!(2), json!(3)]], None)),
        )
        .await;
        let mut rows = rows.unwrap();
        let ctx = Context::background();

        assert!(matches!(rows.next(&ctx).await, Err(FlinkError::Decode { .. })));
        assert!(rows.next(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failure_keeps_delivered_rows_and_ends_iteration() {
        let columns = vec![column("n", "INTEGER", false)];
        let (gateway, rows) = open(
            ScriptedGateway::new()
                .page(page(columns, vec![vec![json!(1)]], Some("1")))
                .fail_page(503, "unavailable"),
        )
        .await;
        let mut rows = rows.unwrap();
        let ctx = Context::background();

        let delivered = rows.next(&ctx).await.unwrap().unwrap();
        assert_eq!(delivered.get(0), Some(&Value::Int(1)));

        assert!(matches!(rows.next(&ctx).await, Err(FlinkError::Gateway { status: 503, .. })));
        assert!(rows.next(&ctx).await.unwrap().is_none());
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    }

    #[tokio::test]
    async fn cancelled_fetch_cancels_the_operation() {
        let columns = vec![column("n", "INTEGER", false)];
        let (gateway, rows) = open(
            ScriptedGateway::new().page(page(columns, vec![], Some("1"))),
        )
        .await;
        let mut rows = rows.unwrap();
        let ctx = Context::background();
        ctx.cancel();

        assert!(matches!(rows.next(&ctx).await, Err(FlinkError::ContextCanceled)));
        assert_eq!(gateway.count(|c| matches!(c, Call::Cancel(_))), 1);
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    }

    #[tokio::test]
    async fn failed_first_fetch_releases_the_operation() {
        let (gateway, rows) = open(ScriptedGateway::new().fail_page(500, "boom")).await;

        assert!(matches!(rows, Err(FlinkError::Gateway { status: 500, .. })));
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
        assert_eq!(gateway.count(|c| matches!(c, Call::Cancel(_))), 0);
    }

    #[tokio::test]
    async fn changing_columns_is_a_protocol_error() {
        let (_, rows) = open(
            ScriptedGateway::new()
                .page(page(vec![column("a", "INTEGER", false)], vec![], Some("1")))
                .page(page(vec![column("b", "VARCHAR", false)], vec![vec![json!("x")]], None)),
        )
        .await;
        let mut rows = rows.unwrap();

        assert!(matches!(
            rows.next(&Context::background()).await,
            Err(FlinkError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn empty_result_is_released_on_open() {
        let (gateway, rows) = open(
            ScriptedGateway::new().page(page(vec![column("a", "INTEGER", false)], vec![], None)),
        )
        .await;
        let mut rows = rows.unwrap();

        assert!(rows.next(&Context::background()).await.unwrap().is_none());
        assert_eq!(gateway.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    }
}
