//! Connector, connection and driver: the surface applications use.
//!
//! A [`Connector`] owns one gateway session, opened on the first
//! [`connect`](Connector::connect) and shared by every [`Connection`] it
//! hands out, so all of them see the same catalogs, tables and session
//! properties.
//!
//! ```no_run
//! use flink_sql_gateway::{Context, Driver};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = Context::background();
//! let connector = Driver.open_connector("http://localhost:8083?execution.runtime-mode=batch")?;
//! let conn = connector.connect(&ctx).await?;
//!
//! let mut rows = conn.query(&ctx, "SELECT 1").await?;
//! while let Some(row) = rows.next(&ctx).await? {
//!     println!("{:?}", row.values());
//! }
//!
//! connector.close().await;
//! # Ok(())
//! # }
//! ```
use crate::client::{Gateway, GatewayClient, GatewayInfo};
use crate::config::{ConnConfig, merge_properties, split_dsn};
use crate::context::Context;
use crate::error::{FlinkError, Result};
use crate::operation::{OperationPoller, PollConfig, close_best_effort};
use crate::pager::ResultPager;
use crate::rows::Rows;
use crate::session::Session;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::debug;


#[derive(Debug)]
struct Shared {
    gateway: Arc<dyn Gateway>,
    properties: BTreeMap<String, String>,
    poll: PollConfig,
    session: OnceCell<Arc<Session>>,
    closed: AtomicBool,
}

/// Factory for connections sharing one gateway session.
///
/// Cloning is cheap; clones share the session.
#[derive(Clone, Debug)]
pub struct Connector {
    shared: Arc<Shared>,
}

impl Connector {
    /// Create a connector talking to the gateway over HTTP.
    ///
    /// Properties given in the query part of `config.gateway_url` are merged
    /// under `config.properties`: explicit properties win on collision. No
    /// request is made until the first [`connect`](Self::connect).
    pub fn new(config: ConnConfig) -> Result<Self> {
        let (url, url_properties) = split_dsn(&config.gateway_url)?;
        let properties = merge_properties(url_properties, config.properties);
        let client = GatewayClient::new(&url, config.client, &config.api_version)?;

        Ok(Self::with_gateway(Arc::new(client), properties, config.poll))
    }

    /// Create a connector over any [`Gateway`] implementation.
    pub fn with_gateway(
        gateway: Arc<dyn Gateway>,
        properties: BTreeMap<String, String>,
        poll: PollConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                gateway,
                properties,
                poll,
                session: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.shared.gateway
    }

    /// Session properties sent when the session is opened.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.shared.properties
    }

    /// The shared session, once the first connection opened it.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.shared.session.get().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Hand out a connection, opening the shared session if needed.
    ///
    /// Concurrent first calls open a single session; the others wait for it.
    /// A failed open leaves the connector without a session so the next call
    /// tries again.
    pub async fn connect(&self, ctx: &Context) -> Result<Connection> {
        if self.is_closed() {
            return Err(FlinkError::SessionClosed);
        }

        let shared = &self.shared;
        let session = shared
            .session
            .get_or_try_init(|| async {
                Session::open(shared.gateway.as_ref(), ctx, shared.properties.clone())
                    .await
                    .map(Arc::new)
            })
            .await?
            .clone();

        // Lost a race with close(): the session opened after it looked.
        if self.is_closed() {
            session.close(shared.gateway.as_ref()).await;
            return Err(FlinkError::SessionClosed);
        }

        Ok(Connection {
            gateway: shared.gateway.clone(),
            session,
            poll: shared.poll.clone(),
            owner: None,
        })
    }

    /// Close the shared session. Later calls do nothing.
    ///
    /// Connections handed out before fail with [`FlinkError::SessionClosed`]
    /// from then on. Gateway failures are logged, not returned.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(session) = self.shared.session.get() {
            session.close(self.shared.gateway.as_ref()).await;
        }
    }

    /// Version information reported by the gateway.
    pub async fn info(&self, ctx: &Context) -> Result<GatewayInfo> {
        self.shared.gateway.info(ctx).await
    }
}


/// Outcome of a statement run for its side effects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub operation_handle: String,
    /// Set when the statement started a Flink job, as `INSERT INTO` does.
    pub job_id: Option<String>,
    pub result_kind: Option<String>,
}

/// One logical connection on a shared session.
#[derive(Debug)]
pub struct Connection {
    gateway: Arc<dyn Gateway>,
    session: Arc<Session>,
    poll: PollConfig,
    /// Set when the connection was opened straight from a DSN and is the
    /// only user of its connector.
    owner: Option<Connector>,
}

impl Connection {
    pub fn session_handle(&self) -> &str {
        self.session.handle()
    }

    /// Submit `sql` and return a cursor over its rows once the operation finished.
    ///
    /// The statement is sent verbatim. `ctx` bounds the submit, the polling
    /// and the fetch of the first page; later pages are fetched under the
    /// context passed to [`Rows::next`].
    pub async fn query(&self, ctx: &Context, sql: &str) -> Result<Rows> {
        let session = self.session.checked_handle()?;

        let operation = self.gateway.submit_statement(ctx, session, sql).await?;
        debug!("Submitted operation {} on session {}", operation, session);

        let waited = OperationPoller::new(self.gateway.as_ref(), &self.poll)
            .wait(ctx, session, &operation)
            .await;
        if let Err(e) = waited {
            close_best_effort(self.gateway.as_ref(), session, &operation).await;
            return Err(e);
        }

        let pager = ResultPager::new(self.gateway.clone(), session, &operation, self.poll.clone());
        Rows::open(ctx, pager).await
    }

    /// Run `sql` for its side effects.
    ///
    /// Waits for the operation to finish, reads the first result page for
    /// the job id and releases the operation.
    pub async fn exec(&self, ctx: &Context, sql: &str) -> Result<ExecResult> {
        let mut rows = self.query(ctx, sql).await?;
        let result = ExecResult {
            operation_handle: rows.operation_handle().to_string(),
            job_id: rows.job_id().map(str::to_string),
            result_kind: rows.result_kind().map(str::to_string),
        };
        rows.close().await;
        Ok(result)
    }

    /// Keep the shared session alive on the gateway.
    pub async fn heartbeat(&self, ctx: &Context) -> Result<()> {
        let session = self.session.checked_handle()?;
        self.gateway.heartbeat(ctx, session).await
    }

    /// Release the connection; closes the session too when the connection
    /// was opened through [`Driver::open`].
    pub async fn close(self) {
        if let Some(connector) = self.owner {
            connector.close().await;
        }
    }
}


/// Entry point taking connection strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct Driver;

impl Driver {
    /// Parse `dsn` into a connector without contacting the gateway.
    pub fn open_connector(&self, dsn: &str) -> Result<Connector> {
        Connector::new(ConnConfig::from_dsn(dsn)?)
    }

    /// Open a connection with its own session.
    pub async fn open(&self, ctx: &Context, dsn: &str) -> Result<Connection> {
        let connector = self.open_connector(dsn)?;
        let mut connection = connector.connect(ctx).await?;
        connection.owner = Some(connector);
        Ok(connection)
    }
}
