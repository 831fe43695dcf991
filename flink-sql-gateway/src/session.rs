use crate::client::Gateway;
use crate::context::Context;
use crate::error::{FlinkError, Result};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};


/// How long a session close may take before it is abandoned.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A remote session, shared by every connection of one connector.
///
/// The handle never changes once the session is open. Closing is the only
/// mutation; afterwards every use of the session fails with
/// [`FlinkError::SessionClosed`].
#[derive(Debug)]
pub struct Session {
    handle: String,
    properties: BTreeMap<String, String>,
    closed: AtomicBool,
}

impl Session {
    pub(crate) fn new(handle: String, properties: BTreeMap<String, String>) -> Self {
        Self {
            handle,
            properties,
            closed: AtomicBool::new(false),
        }
    }

    /// Open a new session on the gateway.
    pub(crate) async fn open(
        gateway: &dyn Gateway,
        ctx: &Context,
        properties: BTreeMap<String, String>,
    ) -> Result<Self> {
        let handle = gateway.open_session(ctx, &properties).await?;
        info!("Opened session {}", handle);
        Ok(Self::new(handle, properties))
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The handle, if the session may still be used.
    pub(crate) fn checked_handle(&self) -> Result<&str> {
        if self.is_closed() {
            return Err(FlinkError::SessionClosed);
        }
        Ok(&self.handle)
    }

    /// Close the session on the gateway, once.
    ///
    /// Failures are logged and swallowed: there is nothing a caller tearing
    /// down a connector can do about them.
    pub(crate) async fn close(&self, gateway: &dyn Gateway) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let ctx = Context::background().with_timeout(CLOSE_TIMEOUT);
        match gateway.close_session(&ctx, &self.handle).await {
            Ok(()) => info!("Closed session {}", self.handle),
            Err(e) => warn!("Failed to close session {}: {}", self.handle, e),
        }
    }
}
