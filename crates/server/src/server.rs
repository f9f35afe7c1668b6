//! AuditServer - audit and metrics listeners with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use contracts::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::error::ServerError;
use crate::handler::{audit_router, AuditHandler};
use crate::tls::{load_server_config, TlsListener};

/// Time in-flight requests get to finish after shutdown starts
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Time cancelled requests get to write their failure response
const CANCEL_DRAIN_PERIOD: Duration = Duration::from_secs(1);

/// Router serving `GET /metrics` in Prometheus text format
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Bound audit and metrics listeners
pub struct AuditServer {
    audit_listener: TlsListener,
    metrics_listener: TcpListener,
    audit_addr: SocketAddr,
    metrics_addr: SocketAddr,
    handler: Arc<AuditHandler>,
    metrics_handle: PrometheusHandle,
    /// 所有请求 context 的父 token
    requests: CancellationToken,
}

impl AuditServer {
    /// Load TLS material and bind both listeners
    ///
    /// `requests` must be the token the handler derives request contexts from;
    /// it is cancelled once the grace period after shutdown elapses.
    #[instrument(
        name = "audit_server_bind",
        skip_all,
        fields(audit = %config.audit_addr(), metrics = %config.metrics_addr())
    )]
    pub async fn bind(
        config: &ServerConfig,
        handler: Arc<AuditHandler>,
        metrics_handle: PrometheusHandle,
        requests: CancellationToken,
    ) -> Result<Self, ServerError> {
        let tls_config = load_server_config(&config.tls)?;

        let audit_tcp = bind(&config.audit_addr()).await?;
        let metrics_listener = bind(&config.metrics_addr()).await?;
        let audit_addr = audit_tcp.local_addr()?;
        let metrics_addr = metrics_listener.local_addr()?;

        Ok(Self {
            audit_listener: TlsListener::new(audit_tcp, tls_config),
            metrics_listener,
            audit_addr,
            metrics_addr,
            handler,
            metrics_handle,
            requests,
        })
    }

    /// Address of the audit listener
    pub fn audit_addr(&self) -> SocketAddr {
        self.audit_addr
    }

    /// Address of the metrics listener
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    /// Serve until `shutdown_signal` resolves or a listener fails
    ///
    /// Shutdown stops accepting connections, waits up to
    /// [`SHUTDOWN_GRACE_PERIOD`] for in-flight requests, then cancels the
    /// remaining request contexts.
    pub async fn serve<F>(self, shutdown_signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            audit_listener,
            metrics_listener,
            audit_addr,
            metrics_addr,
            handler,
            metrics_handle,
            requests,
        } = self;

        let stop = CancellationToken::new();
        let audit_app = audit_router(handler).layer(TraceLayer::new_for_http());
        let metrics_app = metrics_router(metrics_handle);

        let mut listeners = JoinSet::new();
        let audit_stop = stop.clone();
        listeners.spawn(async move {
            axum::serve(audit_listener, audit_app)
                .with_graceful_shutdown(audit_stop.cancelled_owned())
                .await
                .map_err(|source| ServerError::Serve {
                    addr: audit_addr,
                    source,
                })
        });
        let metrics_stop = stop.clone();
        listeners.spawn(async move {
            axum::serve(metrics_listener, metrics_app)
                .with_graceful_shutdown(metrics_stop.cancelled_owned())
                .await
                .map_err(|source| ServerError::Serve {
                    addr: metrics_addr,
                    source,
                })
        });

        info!(audit = %audit_addr, metrics = %metrics_addr, "Server listening");

        let mut outcome = Ok(());
        tokio::select! {
            () = shutdown_signal => {
                info!("Shutdown signal received, draining requests...");
            }
            Some(joined) = listeners.join_next() => {
                outcome = flatten(joined);
                error!("Listener stopped unexpectedly, shutting down");
            }
        }

        stop.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, drain(&mut listeners, &mut outcome))
            .await
            .is_err()
        {
            warn!(
                grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                "Grace period elapsed, cancelling in-flight requests"
            );
            requests.cancel();
            if tokio::time::timeout(CANCEL_DRAIN_PERIOD, drain(&mut listeners, &mut outcome))
                .await
                .is_err()
            {
                listeners.shutdown().await;
            }
        }
        requests.cancel();

        info!("Server shutdown complete");
        outcome
    }
}

async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Wait for every listener task, keeping the first error
async fn drain(
    listeners: &mut JoinSet<Result<(), ServerError>>,
    outcome: &mut Result<(), ServerError>,
) {
    while let Some(joined) = listeners.join_next().await {
        let result = flatten(joined);
        if outcome.is_ok() {
            *outcome = result;
        }
    }
}

fn flatten(
    joined: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    joined.map_err(|e| ServerError::Io(std::io::Error::other(e)))?
}
