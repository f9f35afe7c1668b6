//! 端到端：配置 → 处理链 → 真实 HttpOutput → 本地 sink

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{Compression, ForwarderConfig, OutputConfig};
use dispatcher::outputs_from_configs;
use observability::RequestMetrics;
use processing::{processors_from_config, ProcessorChain};
use server::{audit_router, AuditHandler, ErrorBody};
use tower::ServiceExt;

use crate::support::{closed_port_url, Sink, EVENT_LIST};

const CONFIG_YAML: &str = r#"
apiVersion: config.auditlog-forwarder.gardener.cloud/v1alpha1
kind: AuditlogForwarder
server:
  tls:
    certFile: /tls/tls.crt
    keyFile: /tls/tls.key
outputs:
- http:
    url: https://audit.example.com/ingest
    compression: gzip
injectAnnotations:
  shoot.gardener.cloud/id: shoot-uid
  seed.gardener.cloud/name: seed-a
"#;

/// Load the sample config and point its outputs at local sinks
fn config_with_outputs(urls: &[&str], compression: Compression) -> ForwarderConfig {
    let mut config = ConfigLoader::load_from_str(CONFIG_YAML, ConfigFormat::Yaml).unwrap();
    config.outputs = urls
        .iter()
        .map(|url| {
            let mut output = OutputConfig::http(*url);
            if let Some(http) = output.http.as_mut() {
                http.compression = compression;
            }
            output
        })
        .collect();
    config
}

fn build_handler(config: &ForwarderConfig) -> Arc<AuditHandler> {
    let chain = ProcessorChain::new(processors_from_config(config));
    let outputs = outputs_from_configs(&config.outputs).unwrap();
    Arc::new(AuditHandler::new(chain, outputs, Arc::new(RequestMetrics::new())).unwrap())
}

async fn post_audit(handler: &Arc<AuditHandler>, body: &'static str) -> (StatusCode, Vec<u8>) {
    let response = audit_router(Arc::clone(handler))
        .oneshot(
            Request::post("/audit")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_annotated_events_reach_sink_gzipped() {
    let sink = Sink::start(StatusCode::OK).await;
    let config = config_with_outputs(&[&sink.url], Compression::Gzip);
    let handler = build_handler(&config);

    let (status, body) = post_audit(&handler, EVENT_LIST).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].content_encoding.as_deref(), Some("gzip"));

    let events = received[0].json();
    let items = events["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        assert_eq!(item["annotations"]["shoot.gardener.cloud/id"], "shoot-uid");
        assert_eq!(item["annotations"]["seed.gardener.cloud/name"], "seed-a");
    }
    // 原有注解保留
    assert_eq!(items[0]["annotations"]["authorization.k8s.io/decision"], "allow");
    assert_eq!(items[0]["objectRef"]["name"], "test-pod");

    let snapshot = handler.metrics().snapshot();
    assert_eq!((snapshot.received, snapshot.succeeded, snapshot.failed), (1, 1, 0));
}

#[tokio::test]
async fn test_fan_out_reaches_every_sink() {
    let first = Sink::start(StatusCode::OK).await;
    let second = Sink::start(StatusCode::ACCEPTED).await;
    let config = config_with_outputs(&[&first.url, &second.url], Compression::None);
    let handler = build_handler(&config);

    let (status, _) = post_audit(&handler, EVENT_LIST).await;
    assert_eq!(status, StatusCode::OK);

    let a = first.received();
    let b = second.received();
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert!(a[0].content_encoding.is_none());
    // 所有 output 收到同一份处理后的 payload
    assert_eq!(a[0].body, b[0].body);
}

#[tokio::test]
async fn test_one_failing_output_fails_request() {
    let healthy = Sink::start(StatusCode::OK).await;
    let rejecting = Sink::start(StatusCode::SERVICE_UNAVAILABLE).await;
    let unreachable = closed_port_url();
    let config = config_with_outputs(
        &[&healthy.url, &rejecting.url, &unreachable],
        Compression::None,
    );
    let handler = build_handler(&config);

    let (status, body) = post_audit(&handler, EVENT_LIST).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.code, 500);
    assert_eq!(error.message, "failed to forward audit events");

    // 失败不会阻止其他 output 的投递
    assert_eq!(healthy.received().len(), 1);
    assert_eq!(rejecting.received().len(), 1);

    let per_output = handler.dispatcher().metrics();
    assert_eq!(per_output.len(), 3);
    assert_eq!(per_output[0].1.send_count, 1);
    assert_eq!(per_output[0].1.failure_count, 0);
    assert_eq!(per_output[1].1.failure_count, 1);
    assert_eq!(per_output[2].1.failure_count, 1);

    let snapshot = handler.metrics().snapshot();
    assert_eq!((snapshot.received, snapshot.succeeded, snapshot.failed), (1, 0, 1));
}

#[tokio::test]
async fn test_malformed_payload_never_reaches_outputs() {
    let sink = Sink::start(StatusCode::OK).await;
    let config = config_with_outputs(&[&sink.url], Compression::None);
    let handler = build_handler(&config);

    let (status, body) = post_audit(&handler, "not an event list").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.message, "failed processing audit events");
    assert!(sink.received().is_empty());
}

#[tokio::test]
async fn test_without_annotations_payload_is_forwarded_verbatim() {
    let sink = Sink::start(StatusCode::OK).await;
    let mut config = config_with_outputs(&[&sink.url], Compression::None);
    config.inject_annotations.clear();
    let handler = build_handler(&config);
    assert!(handler.chain().is_empty());

    let (status, _) = post_audit(&handler, "opaque payload").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sink.received()[0].body, b"opaque payload");
}
