//! Echo sink for local debugging
//!
//! Accepts anything: `/health` answers `{"status": "ok"}`, every other
//! request is logged and answered with `{"success": true}`.

use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use contracts::ServerTlsConfig;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::ServerError;
use crate::tls::{load_server_config, TlsListener};

/// Echo sink options
#[derive(Debug, Clone, Default)]
pub struct EchoOptions {
    /// Log request bodies of POST requests
    pub log_body: bool,
}

/// Router of the echo sink
pub fn echo_router(options: EchoOptions) -> Router {
    Router::new()
        .route("/health", any(health))
        .fallback(echo)
        .with_state(Arc::new(options))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn echo(State(options): State<Arc<EchoOptions>>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();

    if parts.method == Method::POST {
        let body: Bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed reading request body");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false})),
                )
                    .into_response();
            }
        };

        if options.log_body {
            info!(
                method = %parts.method,
                path = %parts.uri.path(),
                body = %String::from_utf8_lossy(&body),
                "Request received"
            );
        } else {
            info!(method = %parts.method, path = %parts.uri.path(), bytes = body.len(), "Request received");
        }
    } else {
        info!(method = %parts.method, path = %parts.uri.path(), "Request received");
    }

    Json(json!({"success": true})).into_response()
}

/// Run the echo sink on `0.0.0.0:port` until `shutdown_signal` resolves
///
/// Serves HTTPS when `tls` is given, plain HTTP otherwise.
pub async fn serve_echo<F>(
    port: u16,
    options: EchoOptions,
    tls: Option<&ServerTlsConfig>,
    shutdown_signal: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("0.0.0.0:{port}");
    let tcp = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = tcp.local_addr()?;
    let app = echo_router(options);

    match tls {
        Some(tls) => {
            let listener = TlsListener::new(tcp, load_server_config(tls)?);
            info!(port, "Starting HTTPS echo server");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal)
                .await
        }
        None => {
            info!(port, "Starting HTTP echo server");
            axum::serve(tcp, app)
                .with_graceful_shutdown(shutdown_signal)
                .await
        }
    }
    .map_err(|source| ServerError::Serve {
        addr: local_addr,
        source,
    })
}
