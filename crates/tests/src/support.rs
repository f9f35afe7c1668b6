//! 测试辅助：本地 HTTP sink 与测试 PKI

use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use flate2::read::GzDecoder;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use tempfile::TempDir;

/// One request seen by a [`Sink`]
#[derive(Debug, Clone)]
pub struct Received {
    pub content_encoding: Option<String>,
    pub body: Vec<u8>,
}

impl Received {
    /// Body with gzip transfer compression removed
    pub fn decoded(&self) -> Vec<u8> {
        match self.content_encoding.as_deref() {
            Some("gzip") => {
                let mut out = Vec::new();
                GzDecoder::new(self.body.as_slice())
                    .read_to_end(&mut out)
                    .unwrap();
                out
            }
            _ => self.body.clone(),
        }
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.decoded()).unwrap()
    }
}

/// Local plain-HTTP sink standing in for a remote audit backend
pub struct Sink {
    pub url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Sink {
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/audit", post(record))
            .with_state((status, Arc::clone(&received)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/audit"),
            received,
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

type SinkState = (StatusCode, Arc<Mutex<Vec<Received>>>);

async fn record(
    State((status, received)): State<SinkState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    received.lock().unwrap().push(Received {
        content_encoding: headers
            .get("content-encoding")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.to_vec(),
    });
    status
}

/// URL of a local port nobody listens on
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/audit")
}

/// CA plus server (`localhost`) and client certificates, written to a temp dir
pub struct TestPki {
    dir: TempDir,
    pub ca_pem: String,
    pub client_cert_pem: String,
    pub client_key_pem: String,
}

impl TestPki {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "auditlog-forwarder test CA");
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let server_key = KeyPair::generate().unwrap();
        let mut server_params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        server_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let server_cert = server_params
            .signed_by(&server_key, &ca_cert, &ca_key)
            .unwrap();

        let client_key = KeyPair::generate().unwrap();
        let mut client_params = CertificateParams::new(vec!["client".to_string()]).unwrap();
        client_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let client_cert = client_params
            .signed_by(&client_key, &ca_cert, &ca_key)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ca.crt"), ca_cert.pem()).unwrap();
        std::fs::write(dir.path().join("tls.crt"), server_cert.pem()).unwrap();
        std::fs::write(dir.path().join("tls.key"), server_key.serialize_pem()).unwrap();
        std::fs::write(dir.path().join("client.crt"), client_cert.pem()).unwrap();
        std::fs::write(dir.path().join("client.key"), client_key.serialize_pem()).unwrap();

        Self {
            dir,
            ca_pem: ca_cert.pem(),
            client_cert_pem: client_cert.pem(),
            client_key_pem: client_key.serialize_pem(),
        }
    }

    pub fn ca_file(&self) -> PathBuf {
        self.dir.path().join("ca.crt")
    }

    pub fn cert_file(&self) -> PathBuf {
        self.dir.path().join("tls.crt")
    }

    pub fn key_file(&self) -> PathBuf {
        self.dir.path().join("tls.key")
    }

    pub fn client_cert_file(&self) -> PathBuf {
        self.dir.path().join("client.crt")
    }

    pub fn client_key_file(&self) -> PathBuf {
        self.dir.path().join("client.key")
    }

    /// HTTPS client trusting the test CA, optionally presenting the client certificate
    pub fn client(&self, with_identity: bool, resolve: std::net::SocketAddr) -> reqwest::Client {
        let mut builder = reqwest::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(self.ca_pem.as_bytes()).unwrap())
            .resolve("localhost", resolve);
        if with_identity {
            let pem = format!("{}\n{}", self.client_cert_pem, self.client_key_pem);
            builder = builder.identity(reqwest::Identity::from_pem(pem.as_bytes()).unwrap());
        }
        builder.build().unwrap()
    }
}

/// Minimal audit event list with two events
pub const EVENT_LIST: &str = r#"{
    "kind": "EventList",
    "apiVersion": "audit.k8s.io/v1",
    "metadata": {},
    "items": [
        {
            "level": "Metadata",
            "auditID": "7e0cbccf-8d8a-4f5f-aa53-3b3b7bb2b5c1",
            "stage": "ResponseComplete",
            "verb": "create",
            "objectRef": {"resource": "pods", "namespace": "test-namespace", "name": "test-pod"},
            "annotations": {"authorization.k8s.io/decision": "allow"}
        },
        {
            "level": "Metadata",
            "auditID": "0b3b2b5c-8d8a-4f5f-aa53-7e0cbccf3b3b",
            "stage": "ResponseComplete",
            "verb": "get"
        }
    ]
}"#;
