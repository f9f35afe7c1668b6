//! 端到端：TLS 接入、mTLS、metrics 监听与优雅关闭

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use bytes::Bytes;
use contracts::{
    ClientTlsConfig, Compression, HttpOutputConfig, Output, OutputConfig, OutputError,
    RequestContext, ServerConfig, ServerTlsConfig,
};
use dispatcher::{outputs_from_configs, HttpOutput};
use metrics_exporter_prometheus::PrometheusBuilder;
use observability::RequestMetrics;
use processing::{AnnotationInjector, ProcessorChain};
use server::{AuditHandler, AuditServer};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::support::{Sink, TestPki, EVENT_LIST};

struct RunningServer {
    audit_addr: std::net::SocketAddr,
    metrics_addr: std::net::SocketAddr,
    handler: Arc<AuditHandler>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), server::ServerError>>,
}

async fn start_server(pki: &TestPki, sink_url: &str, mutual_tls: bool) -> RunningServer {
    let config = ServerConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        metrics_port: 0,
        tls: ServerTlsConfig {
            cert_file: pki.cert_file(),
            key_file: pki.key_file(),
            client_ca_file: mutual_tls.then(|| pki.ca_file()),
        },
    };

    let requests = CancellationToken::new();
    let chain = ProcessorChain::new(vec![Box::new(AnnotationInjector::new(
        [("cluster".to_string(), "e2e".to_string())].into(),
    ))]);
    let outputs = outputs_from_configs(&[OutputConfig::http(sink_url)]).unwrap();
    let handler = Arc::new(
        AuditHandler::new(chain, outputs, Arc::new(RequestMetrics::new()))
            .unwrap()
            .with_shutdown_token(requests.clone()),
    );
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let server = AuditServer::bind(&config, Arc::clone(&handler), metrics_handle, requests)
        .await
        .unwrap();
    let audit_addr = server.audit_addr();
    let metrics_addr = server.metrics_addr();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve(async move {
        let _ = stopped.await;
    }));

    RunningServer {
        audit_addr,
        metrics_addr,
        handler,
        stop,
        task,
    }
}

impl RunningServer {
    fn audit_url(&self) -> String {
        format!("https://localhost:{}/audit", self.audit_addr.port())
    }

    async fn shutdown(self) {
        self.stop.send(()).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_https_request_is_forwarded() {
    let pki = TestPki::generate();
    let sink = Sink::start(StatusCode::OK).await;
    let server = start_server(&pki, &sink.url, false).await;

    let response = pki
        .client(false, server.audit_addr)
        .post(server.audit_url())
        .body(EVENT_LIST)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let received = sink.received();
    assert_eq!(received.len(), 1);
    let events = received[0].json();
    assert_eq!(events["items"][1]["annotations"]["cluster"], "e2e");

    let snapshot = server.handler.metrics().snapshot();
    assert_eq!((snapshot.received, snapshot.succeeded, snapshot.failed), (1, 1, 0));

    server.shutdown().await;
}

#[tokio::test]
async fn test_metrics_listener_serves_prometheus_text() {
    let pki = TestPki::generate();
    let sink = Sink::start(StatusCode::OK).await;
    let server = start_server(&pki, &sink.url, false).await;

    let response = reqwest::get(format!("http://{}/metrics", server.metrics_addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    server.shutdown().await;
}

#[tokio::test]
async fn test_mutual_tls_requires_client_certificate() {
    let pki = TestPki::generate();
    let sink = Sink::start(StatusCode::OK).await;
    let server = start_server(&pki, &sink.url, true).await;

    let rejected = pki
        .client(false, server.audit_addr)
        .post(server.audit_url())
        .body(EVENT_LIST)
        .send()
        .await;
    assert!(rejected.is_err());
    assert!(sink.received().is_empty());

    let accepted = pki
        .client(true, server.audit_addr)
        .post(server.audit_url())
        .body(EVENT_LIST)
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), reqwest::StatusCode::OK);
    assert_eq!(sink.received().len(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_idle_connection_does_not_delay_other_clients() {
    let pki = TestPki::generate();
    let sink = Sink::start(StatusCode::OK).await;
    let server = start_server(&pki, &sink.url, false).await;

    // 打开 TCP 连接但从不开始握手
    let _idle = tokio::net::TcpStream::connect(server.audit_addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let response = tokio::time::timeout(
        Duration::from_secs(3),
        pki.client(false, server.audit_addr)
            .post(server.audit_url())
            .body(EVENT_LIST)
            .send(),
    )
    .await
    .expect("request stalled behind idle connection")
    .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(3));

    server.shutdown().await;
}

fn mtls_output(url: &str, tls: ClientTlsConfig) -> HttpOutput {
    HttpOutput::new(&HttpOutputConfig {
        url: url.to_string(),
        compression: Compression::None,
        tls: Some(tls),
    })
    .unwrap()
}

#[tokio::test]
async fn test_http_output_delivers_over_mutual_tls() {
    let pki = TestPki::generate();
    let sink = Sink::start(StatusCode::OK).await;
    let server = start_server(&pki, &sink.url, true).await;
    let url = format!("https://127.0.0.1:{}/audit", server.audit_addr.port());
    let payload = Bytes::from_static(EVENT_LIST.as_bytes());

    let full = ClientTlsConfig {
        ca_file: Some(pki.ca_file()),
        cert_file: Some(pki.client_cert_file()),
        key_file: Some(pki.client_key_file()),
    };
    mtls_output(&url, full.clone())
        .send(&RequestContext::detached(), payload.clone())
        .await
        .unwrap();
    assert_eq!(sink.received().len(), 1);

    // 未配置 CA 时只信任系统根证书，测试 CA 签发的服务端证书被拒绝
    let without_ca = ClientTlsConfig {
        ca_file: None,
        ..full.clone()
    };
    let err = mtls_output(&url, without_ca)
        .send(&RequestContext::detached(), payload.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, OutputError::Transport { .. }), "{err:?}");

    // 服务端要求客户端证书
    let without_identity = ClientTlsConfig {
        cert_file: None,
        key_file: None,
        ..full
    };
    let err = mtls_output(&url, without_identity)
        .send(&RequestContext::detached(), payload)
        .await
        .unwrap_err();
    assert!(matches!(err, OutputError::Transport { .. }), "{err:?}");

    assert_eq!(sink.received().len(), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_listeners() {
    let pki = TestPki::generate();
    let sink = Sink::start(StatusCode::OK).await;
    let server = start_server(&pki, &sink.url, false).await;
    let audit_addr = server.audit_addr;
    let client = pki.client(false, audit_addr);
    let url = server.audit_url();

    server.shutdown().await;

    assert!(client.post(url).body(EVENT_LIST).send().await.is_err());
}
