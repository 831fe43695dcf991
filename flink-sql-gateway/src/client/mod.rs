//! Request layer for the SQL Gateway REST API.
//!
//! [`Gateway`] is the seam the rest of the crate talks to; [`GatewayClient`]
//! is its HTTP implementation on top of [`reqwest`]. The client keeps no
//! per-statement state: every call carries the handles it acts on.
mod models;

pub use self::models::GatewayInfo;
use self::models::{
    ExecuteStatementRequest, ExecuteStatementResponse, FetchResultsResponse, OpenSessionRequest,
    OpenSessionResponse, OperationStatusResponse,
};
use crate::context::Context;
use crate::error::{FlinkError, Result};
use crate::operation::{Operation, OperationStatus};
use crate::result::ResultPage;

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::debug;
use url::Url;


/// Token requested for the first page of a result.
pub const FIRST_PAGE_TOKEN: &str = "0";

/// The remote actions of the SQL Gateway.
///
/// Every call runs under the caller's [`Context`] and is aborted as soon as
/// that context is done.
#[async_trait]
pub trait Gateway: fmt::Debug + Send + Sync {
    /// `POST /{version}/sessions`
    async fn open_session(
        &self,
        ctx: &Context,
        properties: &BTreeMap<String, String>,
    ) -> Result<String>;

    /// `DELETE /{version}/sessions/{session}`
    async fn close_session(&self, ctx: &Context, session: &str) -> Result<()>;

    /// `POST /{version}/sessions/{session}/statements`
    async fn submit_statement(&self, ctx: &Context, session: &str, sql: &str) -> Result<String>;

    /// `GET /{version}/sessions/{session}/operations/{operation}/status`
    async fn operation_status(
        &self,
        ctx: &Context,
        session: &str,
        operation: &str,
    ) -> Result<Operation>;

    /// `GET /{version}/sessions/{session}/operations/{operation}/result/{token}`
    ///
    /// `None` requests the first page.
    async fn fetch_result_page(
        &self,
        ctx: &Context,
        session: &str,
        operation: &str,
        token: Option<&str>,
    ) -> Result<ResultPage>;

    /// `POST /{version}/sessions/{session}/operations/{operation}/cancel`
    async fn cancel_operation(&self, ctx: &Context, session: &str, operation: &str) -> Result<()>;

    /// `DELETE /{version}/sessions/{session}/operations/{operation}/close`
    async fn close_operation(&self, ctx: &Context, session: &str, operation: &str) -> Result<()>;

    /// `POST /{version}/sessions/{session}/heartbeat`
    async fn heartbeat(&self, ctx: &Context, session: &str) -> Result<()>;

    /// `GET /{version}/info`
    async fn info(&self, ctx: &Context) -> Result<GatewayInfo>;
}


/// HTTP implementation of [`Gateway`].
#[derive(Clone, Debug)]
pub struct GatewayClient {
    base_url: Url,
    http: reqwest::Client,
    api_version: String,
}

impl GatewayClient {
    /// Create a client for `gateway_url`, e.g. `http://localhost:8083`.
    ///
    /// Fails with [`FlinkError::Config`] for URLs that are not http(s), carry a
    /// query string, or when `api_version` is not of the form `v<digits>`.
    pub fn new(gateway_url: &str, http: reqwest::Client, api_version: &str) -> Result<Self> {
        let base_url = Url::parse(gateway_url)?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(FlinkError::Config(format!(
                "Unsupported gateway URL scheme '{}'", base_url.scheme()
            )));
        }
        if base_url.query().is_some() {
            return Err(FlinkError::Config(
                "Gateway URL must not carry query parameters".to_string()
            ));
        }
        if !is_api_version(api_version) {
            return Err(FlinkError::Config(format!("Invalid API version '{}'", api_version)));
        }

        Ok(Self {
            base_url,
            http,
            api_version: api_version.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Build `{base}/{version}/{segments...}`; every segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FlinkError::Config(format!("Gateway URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(&self.api_version)
            .extend(segments);
        Ok(url)
    }

    fn operation_endpoint(&self, session: &str, operation: &str, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["sessions", session, "operations", operation];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    /// Send a request and classify the outcome.
    ///
    /// Transport failures become [`FlinkError::Connection`], non-2xx
    /// responses [`FlinkError::Gateway`] with the body kept verbatim.
    async fn send(&self, ctx: &Context, request: reqwest::RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        let started = Instant::now();

        let response = ctx.run(self.http.execute(request)).await??;
        let status = response.status();
        debug!(
            "{} {} -> {} ({} ms)",
            method, path, status.as_u16(), started.elapsed().as_millis()
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = ctx.run(response.text()).await?.unwrap_or_default();
        Err(FlinkError::Gateway {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.send(ctx, request).await?;
        let bytes = ctx.run(response.bytes()).await??;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_discard(&self, ctx: &Context, request: reqwest::RequestBuilder) -> Result<()> {
        let response = self.send(ctx, request).await?;
        // Drain so the connection can be reused.
        ctx.run(response.bytes()).await??;
        Ok(())
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn open_session(
        &self,
        ctx: &Context,
        properties: &BTreeMap<String, String>,
    ) -> Result<String> {
        let url = self.endpoint(&["sessions"])?;
        let body = OpenSessionRequest { properties };

        let resp: OpenSessionResponse = self
            .send_json(ctx, self.request(Method::POST, url).json(&body))
            .await?;
        Ok(resp.session_handle)
    }

    async fn close_session(&self, ctx: &Context, session: &str) -> Result<()> {
        let url = self.endpoint(&["sessions", session])?;
        self.send_discard(ctx, self.request(Method::DELETE, url)).await
    }

    async fn submit_statement(&self, ctx: &Context, session: &str, sql: &str) -> Result<String> {
        let url = self.endpoint(&["sessions", session, "statements"])?;
        let body = ExecuteStatementRequest { statement: sql };

        let resp: ExecuteStatementResponse = self
            .send_json(ctx, self.request(Method::POST, url).json(&body))
            .await?;
        Ok(resp.operation_handle)
    }

    async fn operation_status(
        &self,
        ctx: &Context,
        session: &str,
        operation: &str,
    ) -> Result<Operation> {
        let url = self.operation_endpoint(session, operation, &["status"])?;

        let resp: OperationStatusResponse = self
            .send_json(ctx, self.request(Method::GET, url))
            .await?;

        Ok(Operation {
            handle: operation.to_string(),
            session_handle: session.to_string(),
            status: resp.status.parse::<OperationStatus>()?,
            error_message: resp.error_message,
        })
    }

    async fn fetch_result_page(
        &self,
        ctx: &Context,
        session: &str,
        operation: &str,
        token: Option<&str>,
    ) -> Result<ResultPage> {
        let token = token.unwrap_or(FIRST_PAGE_TOKEN);
        let mut url = self.operation_endpoint(session, operation, &["result", token])?;
        url.query_pairs_mut().append_pair("rowFormat", "JSON");

        let resp: FetchResultsResponse = self
            .send_json(ctx, self.request(Method::GET, url))
            .await?;
        Ok(resp.into())
    }

    async fn cancel_operation(&self, ctx: &Context, session: &str, operation: &str) -> Result<()> {
        let url = self.operation_endpoint(session, operation, &["cancel"])?;
        self.send_discard(ctx, self.request(Method::POST, url)).await
    }

    async fn close_operation(&self, ctx: &Context, session: &str, operation: &str) -> Result<()> {
        let url = self.operation_endpoint(session, operation, &["close"])?;
        self.send_discard(ctx, self.request(Method::DELETE, url)).await
    }

    async fn heartbeat(&self, ctx: &Context, session: &str) -> Result<()> {
        let url = self.endpoint(&["sessions", session, "heartbeat"])?;
        self.send_discard(ctx, self.request(Method::POST, url)).await
    }

    async fn info(&self, ctx: &Context) -> Result<GatewayInfo> {
        let url = self.endpoint(&["info"])?;
        self.send_json(ctx, self.request(Method::GET, url)).await
    }
}

fn is_api_version(version: &str) -> bool {
    version
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}
