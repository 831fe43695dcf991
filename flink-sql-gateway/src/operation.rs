//! Remote operation lifecycle and the poller that drives it.
//!
//! A submitted statement starts as `PENDING` (or `INITIALIZED`), moves to
//! `RUNNING` and ends in one of the terminal states. [`OperationPoller`]
//! asks for the status until a terminal state is reached, waiting a capped
//! exponential backoff between polls.
use crate::client::Gateway;
use crate::context::Context;
use crate::error::{FlinkError, Result};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, trace, warn};


/// Remote status of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    Initialized,
    Pending,
    Running,
    Finished,
    Error,
    Canceled,
    Closed,
    Timeout,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            OperationStatus::Initialized | OperationStatus::Pending | OperationStatus::Running
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Initialized => "INITIALIZED",
            OperationStatus::Pending => "PENDING",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Finished => "FINISHED",
            OperationStatus::Error => "ERROR",
            OperationStatus::Canceled => "CANCELED",
            OperationStatus::Closed => "CLOSED",
            OperationStatus::Timeout => "TIMEOUT",
        }
    }

    /// Position in the lifecycle; statuses only ever move to a higher rank.
    fn rank(&self) -> u8 {
        match self {
            OperationStatus::Initialized => 0,
            OperationStatus::Pending => 1,
            OperationStatus::Running => 2,
            _ => 3,
        }
    }
}

impl FromStr for OperationStatus {
    type Err = FlinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INITIALIZED" => Ok(OperationStatus::Initialized),
            "PENDING" => Ok(OperationStatus::Pending),
            "RUNNING" => Ok(OperationStatus::Running),
            "FINISHED" => Ok(OperationStatus::Finished),
            "ERROR" => Ok(OperationStatus::Error),
            "CANCELED" | "CANCELLED" => Ok(OperationStatus::Canceled),
            "CLOSED" => Ok(OperationStatus::Closed),
            "TIMEOUT" => Ok(OperationStatus::Timeout),
            other => Err(FlinkError::Protocol(format!("Unknown operation status '{}'", other))),
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side handle of one submitted statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub handle: String,
    pub session_handle: String,
    pub status: OperationStatus,
    pub error_message: Option<String>,
}

/// Backoff parameters for status polling and for results that are not ready yet.
///
/// The wait starts at `min_interval` and is multiplied by `multiplier` after
/// each non-terminal answer, up to `max_interval`. The core sets no overall
/// limit on polling: the caller's [`Context`] deadline is that limit.
#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Upper bound on the best-effort cancel request sent after the caller gave up.
    pub cancel_grace: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(1),
            multiplier: 2.0,
            cancel_grace: Duration::from_secs(1),
        }
    }
}

impl PollConfig {
    const FLOOR: Duration = Duration::from_millis(1);

    pub fn initial_interval(&self) -> Duration {
        self.min_interval.max(Self::FLOOR)
    }

    pub fn next_interval(&self, current: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let ceiling = self.max_interval.max(self.initial_interval());

        current
            .mul_f64(multiplier)
            .clamp(self.initial_interval(), ceiling)
    }
}


/// Drives one operation to a terminal state.
pub struct OperationPoller<'a> {
    gateway: &'a dyn Gateway,
    config: &'a PollConfig,
}

impl<'a> OperationPoller<'a> {
    pub fn new(gateway: &'a dyn Gateway, config: &'a PollConfig) -> Self {
        Self { gateway, config }
    }

    /// Poll until the operation is terminal.
    ///
    /// Returns the operation once it is `FINISHED`, [`FlinkError::OperationFailed`]
    /// for `ERROR` and `TIMEOUT`, [`FlinkError::OperationCanceled`] for
    /// `CANCELED` and `CLOSED`. When `ctx` is done first, a cancel request is
    /// sent to the gateway and the context error is returned.
    pub async fn wait(&self, ctx: &Context, session: &str, operation: &str) -> Result<Operation> {
        let mut interval = self.config.initial_interval();
        let mut last: Option<OperationStatus> = None;

        loop {
            let op = match self.gateway.operation_status(ctx, session, operation).await {
                Ok(op) => op,
                Err(e) => return Err(self.abandon(session, operation, e).await),
            };
            trace!("Operation {} is {}", operation, op.status);

            if let Some(previous) = last {
                if op.status.rank() < previous.rank() {
                    return Err(FlinkError::Protocol(format!(
                        "Operation {} went from {} back to {}",
                        operation, previous, op.status
                    )));
                }
            }
            last = Some(op.status);

            match op.status {
                OperationStatus::Finished => return Ok(op),
                OperationStatus::Error => {
                    let message = match op.error_message {
                        Some(message) => message,
                        None => self.failure_message(ctx, session, operation).await,
                    };
                    return Err(FlinkError::OperationFailed(message));
                }
                OperationStatus::Timeout => {
                    return Err(FlinkError::OperationFailed(format!(
                        "Operation {} timed out on the gateway", operation
                    )))
                }
                OperationStatus::Canceled | OperationStatus::Closed => {
                    return Err(FlinkError::OperationCanceled)
                }
                _ => {}
            }

            if let Err(e) = ctx.sleep(interval).await {
                return Err(self.abandon(session, operation, e).await);
            }
            interval = self.config.next_interval(interval);
        }
    }

    /// The status endpoint carries no error detail; the result endpoint
    /// answers a failed operation with the server-side exception.
    async fn failure_message(&self, ctx: &Context, session: &str, operation: &str) -> String {
        let fallback = format!("Operation {} failed", operation);

        match self.gateway.fetch_result_page(ctx, session, operation, None).await {
            Err(e @ FlinkError::Gateway { .. }) => {
                let messages = e.gateway_messages();
                if messages.is_empty() {
                    fallback
                } else {
                    messages.join("\n")
                }
            }
            _ => fallback,
        }
    }

    async fn abandon(&self, session: &str, operation: &str, error: FlinkError) -> FlinkError {
        if error.is_cancellation() {
            cancel_best_effort(self.gateway, self.config, session, operation).await;
        }
        error
    }
}

/// Ask the gateway to cancel `operation`, bounded by the configured grace period.
///
/// Runs under a fresh context because the caller's one is already done.
pub(crate) async fn cancel_best_effort(
    gateway: &dyn Gateway,
    config: &PollConfig,
    session: &str,
    operation: &str,
) {
    let ctx = Context::background().with_timeout(config.cancel_grace);
    if let Err(e) = gateway.cancel_operation(&ctx, session, operation).await {
        warn!("Failed to cancel operation {}: {}", operation, e);
    }
}

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Release `operation` on the gateway. Failures are logged and dropped.
pub(crate) async fn close_best_effort(gateway: &dyn Gateway, session: &str, operation: &str) {
    let ctx = Context::background().with_timeout(CLOSE_TIMEOUT);
    match gateway.close_operation(&ctx, session, operation).await {
        Ok(()) => debug!("Released operation {}", operation),
        Err(e) => warn!("Failed to release operation {}: {}", operation, e),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, ScriptedGateway};
    use tokio::time::Instant;

    fn fast() -> PollConfig {
        PollConfig {
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(40),
            ..Default::default()
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("running".parse::<OperationStatus>().unwrap(), OperationStatus::Running);
        assert_eq!("CANCELED".parse::<OperationStatus>().unwrap(), OperationStatus::Canceled);
        assert!(matches!(
            "EXPLODED".parse::<OperationStatus>(),
            Err(FlinkError::Protocol(_))
        ));
    }

    #[test]
    fn backoff_is_capped_exponential() {
        let config = fast();
        let mut interval = config.initial_interval();
        let mut seen = vec![interval];
        for _ in 0..4 {
            interval = config.next_interval(interval);
            seen.push(interval);
        }
        assert_eq!(
            seen,
            [10, 20, 40, 40, 40].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn backoff_never_drops_below_floor() {
        let config = PollConfig {
            min_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            multiplier: 0.0,
            ..Default::default()
        };
        let interval = config.initial_interval();
        assert_eq!(interval, Duration::from_millis(1));
        assert_eq!(config.next_interval(interval), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn finishes_after_pending_and_running() {
        let gateway = ScriptedGateway::new().statuses([
            OperationStatus::Pending,
            OperationStatus::Running,
            OperationStatus::Finished,
        ]);
        let config = fast();

        let op = OperationPoller::new(&gateway, &config)
            .wait(&Context::background(), "s", "o")
            .await
            .unwrap();

        assert_eq!(op.status, OperationStatus::Finished);
        assert_eq!(gateway.count(|c| matches!(c, Call::Status(_))), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_fails_with_message() {
        let gateway = ScriptedGateway::new()
            .statuses([OperationStatus::Running, OperationStatus::Error])
            .status_error("Table `orders` not found");
        let config = fast();

        let err = OperationPoller::new(&gateway, &config)
            .wait(&Context::background(), "s", "o")
            .await
            .unwrap_err();

        assert!(matches!(err, FlinkError::OperationFailed(ref m) if m.contains("orders")));
    }

    #[tokio::test(start_paused = true)]
    async fn error_detail_is_taken_from_result_endpoint() {
        let gateway = ScriptedGateway::new()
            .statuses([OperationStatus::Error])
            .fail_page(500, r#"{"errors":["Internal server error.","SqlParserException: bad"]}"#);
        let config = fast();

        let err = OperationPoller::new(&gateway, &config)
            .wait(&Context::background(), "s", "o")
            .await
            .unwrap_err();

        match err {
            FlinkError::OperationFailed(message) => assert!(message.contains("SqlParserException")),
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn canceled_and_closed_statuses_are_cancellations() {
        for status in [OperationStatus::Canceled, OperationStatus::Closed] {
            let gateway = ScriptedGateway::new().statuses([status]);
            let config = fast();
            let err = OperationPoller::new(&gateway, &config)
                .wait(&Context::background(), "s", "o")
                .await
                .unwrap_err();
            assert!(matches!(err, FlinkError::OperationCanceled), "{status}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn status_regression_is_a_protocol_error() {
        let gateway = ScriptedGateway::new().statuses([
            OperationStatus::Running,
            OperationStatus::Pending,
        ]);
        let config = fast();

        let err = OperationPoller::new(&gateway, &config)
            .wait(&Context::background(), "s", "o")
            .await
            .unwrap_err();
        assert!(matches!(err, FlinkError::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_within_one_interval_and_cancels_remotely() {
        // Running forever.
        let gateway = ScriptedGateway::new().statuses([OperationStatus::Running]);
        let config = PollConfig {
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_millis(500),
            ..Default::default()
        };
        let ctx = Context::background();

        let canceller = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(1_250)).await;
                ctx.cancel();
            })
        };

        let started = Instant::now();
        let err = OperationPoller::new(&gateway, &config)
            .wait(&ctx, "s", "o")
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, FlinkError::ContextCanceled));
        assert!(started.elapsed() < Duration::from_millis(1_250) + config.max_interval);
        assert_eq!(gateway.count(|c| matches!(c, Call::Cancel(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_reported_as_deadline_exceeded() {
        let gateway = ScriptedGateway::new().statuses([OperationStatus::Pending]);
        let config = fast();
        let ctx = Context::background().with_timeout(Duration::from_millis(300));

        let err = OperationPoller::new(&gateway, &config)
            .wait(&ctx, "s", "o")
            .await
            .unwrap_err();

        assert!(matches!(err, FlinkError::DeadlineExceeded));
        assert_eq!(gateway.count(|c| matches!(c, Call::Cancel(_))), 1);
    }
}
