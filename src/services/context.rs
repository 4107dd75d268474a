//! Per-request correlation and cancellation.

use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use super::manager::TaskManagerError;

/// Context accompanying every manager call.
///
/// Carries a correlation id stamped on log lines and a cancellation token
/// checked before each storage call. Observable-only: the context never
/// affects persisted state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Creates a context with a freshly minted request id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a context carrying an existing request id.
    ///
    /// The nil UUID is treated as absent: a warning is logged and a fresh
    /// id is minted instead.
    #[must_use]
    pub fn with_request_id(request_id: Uuid) -> Self {
        if request_id.is_nil() {
            warn!("request id is nil, minting a fresh one");
            return Self::new();
        }
        Self {
            request_id,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Returns the cancellation token, for wiring deadlines or external
    /// cancel signals.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Requests cancellation of the in-flight operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails with [`TaskManagerError::Cancelled`] once the token has fired.
    ///
    /// # Errors
    ///
    /// Returns [`TaskManagerError::Cancelled`] when the context is
    /// cancelled.
    pub fn ensure_active(&self) -> Result<(), TaskManagerError> {
        if self.cancel.is_cancelled() {
            return Err(TaskManagerError::Cancelled);
        }
        Ok(())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
