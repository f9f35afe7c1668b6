//! TLS support using rustls
//!
//! [`TlsListener`] wraps a TCP listener with TLS termination and implements
//! [`axum::serve::Listener`], so it can be passed to `axum::serve()` directly.

use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use contracts::ServerTlsConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;

/// Upper bound for a single TLS handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A TLS-enabled listener wrapping a [`TcpListener`] with a [`TlsAcceptor`]
///
/// Handshakes run as separate tasks; `accept` only yields connections whose
/// handshake already finished, so a slow or silent peer never holds up others.
pub struct TlsListener {
    tcp: TcpListener,
    acceptor: TlsAcceptor,
    handshakes: JoinSet<Option<(TlsStream<TcpStream>, SocketAddr)>>,
}

impl TlsListener {
    /// Create a new TLS listener from an existing TCP listener and server config
    pub fn new(tcp: TcpListener, server_config: Arc<ServerConfig>) -> Self {
        Self {
            tcp,
            acceptor: TlsAcceptor::from(server_config),
            handshakes: JoinSet::new(),
        }
    }
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    fn accept(&mut self) -> impl std::future::Future<Output = (Self::Io, Self::Addr)> + Send {
        let Self {
            tcp,
            acceptor,
            handshakes,
        } = self;

        // 两个分支都是 cancel-safe：未完成的握手留在 JoinSet 中
        async move {
            loop {
                tokio::select! {
                    accepted = TcpListener::accept(tcp) => match accepted {
                        Ok((stream, addr)) => {
                            handshakes.spawn(handshake(acceptor.clone(), stream, addr));
                        }
                        Err(e) => {
                            error!(error = %e, "TCP accept error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    },
                    Some(joined) = handshakes.join_next() => match joined {
                        Ok(Some(established)) => return established,
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "TLS handshake task failed"),
                    },
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

/// Run one handshake, bounded by [`HANDSHAKE_TIMEOUT`]
async fn handshake(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    addr: SocketAddr,
) -> Option<(TlsStream<TcpStream>, SocketAddr)> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => Some((tls_stream, addr)),
        Ok(Err(e)) => {
            warn!(peer = %addr, error = %e, "TLS handshake failed");
            None
        }
        Err(_) => {
            warn!(peer = %addr, "TLS handshake timed out");
            None
        }
    }
}

/// Load a rustls [`ServerConfig`] from the configured PEM files
///
/// TLS 1.2 and 1.3 are accepted. With `clientCAFile` set, clients must present
/// a certificate signed by that CA.
pub fn load_server_config(tls: &ServerTlsConfig) -> Result<Arc<ServerConfig>, ServerError> {
    let provider: Arc<CryptoProvider> = Arc::new(ring::default_provider());

    let cert_chain = load_certs(&tls.cert_file)?;
    let key = load_private_key(&tls.key_file)?;

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ServerError::tls(format!("Failed to select TLS versions: {e}")))?;

    let builder = match &tls.client_ca_file {
        Some(ca_file) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(ca_file)? {
                roots.add(cert).map_err(|e| {
                    ServerError::tls(format!(
                        "Invalid client CA certificate in '{}': {e}",
                        ca_file.display()
                    ))
                })?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| ServerError::tls(format!("Failed to build client verifier: {e}")))?;

            info!(client_ca = %ca_file.display(), "Client certificate verification enabled");
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let mut config = builder
        .with_single_cert(cert_chain, key)
        .map_err(|e| ServerError::tls(format!("Failed to build TLS server config: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    debug!(cert = %tls.cert_file.display(), "TLS server config loaded");
    Ok(Arc::new(config))
}

/// Read a PEM certificate chain
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let file = File::open(path).map_err(|e| {
        ServerError::tls(format!(
            "Failed to open certificate file '{}': {e}",
            path.display()
        ))
    })?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            ServerError::tls(format!(
                "Failed to parse certificates in '{}': {e}",
                path.display()
            ))
        })?;

    if certs.is_empty() {
        return Err(ServerError::tls(format!(
            "'{}' contains no certificates",
            path.display()
        )));
    }
    Ok(certs)
}

/// Read the first PEM private key
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let file = File::open(path).map_err(|e| {
        ServerError::tls(format!("Failed to open key file '{}': {e}", path.display()))
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| {
            ServerError::tls(format!(
                "Failed to parse private key in '{}': {e}",
                path.display()
            ))
        })?
        .ok_or_else(|| ServerError::tls(format!("'{}' contains no private key", path.display())))
}
