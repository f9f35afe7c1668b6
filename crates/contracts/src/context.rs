//! RequestContext - per-request correlation and cancellation
//!
//! Threaded explicitly through processors and outputs instead of ambient state.

use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// Request-scoped context
///
/// Cheap to clone; clones share the same cancellation signal and span.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    cancel: CancellationToken,
    span: Span,
}

impl RequestContext {
    /// Create a context for a new request
    ///
    /// The cancellation token is a child of `parent`, so cancelling the parent
    /// (process shutdown) cancels every in-flight request.
    pub fn new(parent: &CancellationToken) -> Self {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("audit_request", req_id = %request_id);
        Self {
            request_id,
            cancel: parent.child_token(),
            span,
        }
    }

    /// Create a context not bound to any parent token
    pub fn detached() -> Self {
        Self::new(&CancellationToken::new())
    }

    /// Correlation id of the request
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Span every log line of the request is recorded in
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Cancellation token of the request
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the request is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Cancel the request and everything dispatched with it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::detached()
    }
}
