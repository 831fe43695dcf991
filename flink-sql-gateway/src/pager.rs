use crate::client::Gateway;
use crate::context::Context;
use crate::error::Result;
use crate::operation::PollConfig;
use crate::result::{ResultPage, ResultType};

use std::sync::Arc;
use std::time::Duration;
use tracing::trace;


/// Where the pager is in the token chain.
#[derive(Clone, Debug, PartialEq, Eq)]
enum PagerState {
    /// Nothing fetched yet.
    Initial,
    /// The next fetch uses this token.
    Next(String),
    /// The last page was fetched, or the iteration failed.
    Done,
}

/// Walks the page-token chain of a finished operation.
///
/// The first request carries no token, every following one the token of the
/// page before it. Pages come back in chain order and none is fetched twice.
/// A failed fetch ends the iteration for good: the pager never resumes from
/// a stale token.
#[derive(Debug)]
pub struct ResultPager {
    gateway: Arc<dyn Gateway>,
    session: String,
    operation: String,
    state: PagerState,
    poll: PollConfig,
    /// Wait before the next fetch; set while the gateway answers `NOT_READY`.
    backoff: Option<Duration>,
}

impl ResultPager {
    pub fn new(gateway: Arc<dyn Gateway>, session: &str, operation: &str, poll: PollConfig) -> Self {
        Self {
            gateway,
            session: session.to_string(),
            operation: operation.to_string(),
            state: PagerState::Initial,
            poll,
            backoff: None,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub fn is_done(&self) -> bool {
        self.state == PagerState::Done
    }

    /// Fetch the next page, or `None` once the chain has ended.
    ///
    /// An empty page that still names a next token is returned as is; it
    /// does not end the iteration.
    pub async fn next_page(&mut self, ctx: &Context) -> Result<Option<ResultPage>> {
        let token = match &self.state {
            PagerState::Done => return Ok(None),
            PagerState::Initial => None,
            PagerState::Next(token) => Some(token.clone()),
        };

        if let Some(wait) = self.backoff {
            if let Err(e) = ctx.sleep(wait).await {
                self.state = PagerState::Done;
                return Err(e);
            }
        }

        let fetched = self
            .gateway
            .fetch_result_page(ctx, &self.session, &self.operation, token.as_deref())
            .await;

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                self.state = PagerState::Done;
                return Err(e);
            }
        };
        trace!(
            "Fetched page {} of operation {}: {:?} with {} row(s)",
            token.as_deref().unwrap_or("<first>"), self.operation, page.result_type, page.rows.len()
        );

        self.backoff = match page.result_type {
            ResultType::NotReady => Some(match self.backoff {
                Some(current) => self.poll.next_interval(current),
                None => self.poll.initial_interval(),
            }),
            _ => None,
        };
        self.state = match (&page.next_token, page.is_last()) {
            (Some(next), false) => PagerState::Next(next.clone()),
            _ => PagerState::Done,
        };

        Ok(Some(page))
    }

    /// Stop iterating; later calls to [`next_page`](Self::next_page) return `None`.
    pub fn finish(&mut self) {
        self.state = PagerState::Done;
    }
}
