//! AuditHandler - `POST /audit`
//!
//! receive → read body → processor chain → fan-out → respond.
//! Every request records `received` once and exactly one of `succeeded` / `failed`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use contracts::{Output, RequestContext};
use dispatcher::{Dispatcher, DispatcherError, ForwardError};
use observability::RequestMetrics;
use processing::{PipelineError, ProcessorChain};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Time a client gets to deliver the complete request body
pub const BODY_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON body of every failure response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

/// Why a request failed
///
/// The detailed error is logged; callers only see [`RequestFailure::public_message`].
#[derive(Debug, Error)]
enum RequestFailure {
    #[error("failed reading body request: {0}")]
    ReadBody(#[source] axum::Error),

    #[error("failed reading body request: no complete body after {0:?}")]
    ReadTimeout(Duration),

    #[error("failed reading body request: request cancelled")]
    ReadCancelled,

    #[error(transparent)]
    Process(#[from] PipelineError),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl RequestFailure {
    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::ReadBody(_) | Self::ReadTimeout(_) | Self::ReadCancelled => {
                "failed reading body request"
            }
            Self::Process(_) => "failed processing audit events",
            Self::Forward(_) => "failed to forward audit events",
        }
    }

    /// Outputs that rejected the payload, empty unless forwarding failed
    fn failed_outputs(&self) -> Vec<&str> {
        match self {
            Self::Forward(e) => e.output_names(),
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for RequestFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: status.as_u16(),
            message: self.public_message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Request handler: composition of processor chain, dispatcher and metrics
///
/// Built once at startup and shared read-only by all requests.
pub struct AuditHandler {
    chain: ProcessorChain,
    dispatcher: Dispatcher,
    metrics: Arc<RequestMetrics>,
    /// 所有请求 context 的父 token，进程关闭时取消
    shutdown: CancellationToken,
    body_limit: usize,
    read_timeout: Duration,
}

impl AuditHandler {
    /// Create a handler
    ///
    /// # Errors
    /// Fails with [`DispatcherError::NoOutputs`] if `outputs` is empty.
    pub fn new(
        chain: ProcessorChain,
        outputs: Vec<Arc<dyn Output>>,
        metrics: Arc<RequestMetrics>,
    ) -> Result<Self, DispatcherError> {
        Ok(Self {
            chain,
            dispatcher: Dispatcher::new(outputs)?,
            metrics,
            shutdown: CancellationToken::new(),
            body_limit: MAX_BODY_BYTES,
            read_timeout: BODY_READ_TIMEOUT,
        })
    }

    /// Derive request contexts from `token`
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Override the request body limit
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Override the request body read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn metrics(&self) -> &Arc<RequestMetrics> {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn chain(&self) -> &ProcessorChain {
        &self.chain
    }

    /// Handle one audit request
    pub async fn handle(&self, body: Body) -> Response {
        let ctx = RequestContext::new(&self.shutdown);
        // 客户端断开时 handler future 被 drop，取消所有在途 output 调用
        let _cancel_on_drop = ctx.cancellation().clone().drop_guard();

        self.metrics.record_received();

        let outcome = self
            .process(&ctx, body)
            .instrument(ctx.span().clone())
            .await;

        match outcome {
            Ok(()) => {
                self.metrics.record_succeeded();
                debug!(parent: ctx.span(), "Audit events forwarded");
                StatusCode::OK.into_response()
            }
            Err(failure) => {
                self.metrics.record_failed();
                error!(
                    parent: ctx.span(),
                    error = %failure,
                    failed_outputs = ?failure.failed_outputs(),
                    "{}",
                    failure.public_message()
                );
                failure.into_response()
            }
        }
    }

    async fn process(&self, ctx: &RequestContext, body: Body) -> Result<(), RequestFailure> {
        // 慢速或停滞的客户端不能无限占用请求
        let read = tokio::time::timeout(
            self.read_timeout,
            axum::body::to_bytes(body, self.body_limit),
        );
        let payload = tokio::select! {
            () = ctx.cancelled() => return Err(RequestFailure::ReadCancelled),
            read = read => read
                .map_err(|_| RequestFailure::ReadTimeout(self.read_timeout))?
                .map_err(RequestFailure::ReadBody)?,
        };

        let payload = self.chain.run(ctx, payload).await?;
        self.dispatcher.forward(ctx, payload).await?;
        Ok(())
    }
}

/// Router serving `POST /audit`
pub fn audit_router(handler: Arc<AuditHandler>) -> Router {
    Router::new()
        .route("/audit", post(handle_audit))
        .with_state(handler)
}

async fn handle_audit(State(handler): State<Arc<AuditHandler>>, body: Body) -> Response {
    handler.handle(body).await
}
