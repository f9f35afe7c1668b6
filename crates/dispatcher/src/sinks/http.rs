//! HttpOutput - POST the payload to a remote HTTP endpoint

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use contracts::{
    ClientTlsConfig, Compression, ContractError, HttpOutputConfig, Output, OutputError,
    RequestContext,
};
use flate2::write::GzEncoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{debug, error, instrument};

/// Whole-request ceiling of every HTTP output
pub const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

const MIME_APPLICATION_JSON: &str = "application/json";
const CONTENT_ENCODING_GZIP: &str = "gzip";

/// Output that POSTs the payload to a URL
///
/// The underlying client pools connections and is shared by all concurrent sends.
#[derive(Debug, Clone)]
pub struct HttpOutput {
    url: String,
    client: reqwest::Client,
    compression: Compression,
}

impl HttpOutput {
    /// Create a new HttpOutput
    ///
    /// # Errors
    /// Fails when the TLS material cannot be read or parsed.
    #[instrument(name = "http_output_new", skip(config), fields(url = %config.url))]
    pub fn new(config: &HttpOutputConfig) -> Result<Self, ContractError> {
        let client = build_client(config.tls.as_ref())?;

        debug!(compression = ?config.compression, "HttpOutput created");

        Ok(Self {
            url: config.url.clone(),
            client,
            compression: config.compression,
        })
    }

    fn encode_body(&self, payload: Bytes) -> Result<Bytes, OutputError> {
        match self.compression {
            Compression::None => Ok(payload),
            Compression::Gzip => gzip(&payload).map(Bytes::from),
        }
    }
}

#[async_trait]
impl Output for HttpOutput {
    fn name(&self) -> &str {
        &self.url
    }

    async fn send(&self, ctx: &RequestContext, payload: Bytes) -> Result<(), OutputError> {
        if ctx.is_cancelled() {
            return Err(OutputError::Cancelled);
        }

        let body = self.encode_body(payload)?;
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, MIME_APPLICATION_JSON);
        if self.compression == Compression::Gzip {
            request = request.header(CONTENT_ENCODING, CONTENT_ENCODING_GZIP);
        }

        let response = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(OutputError::Cancelled),
            result = request.body(body).send() => {
                result.map_err(|e| OutputError::transport(e.to_string(), e))?
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(OutputError::Cancelled),
            text = response.text() => text,
        };
        let body = body.unwrap_or_else(|e| {
            error!(parent: ctx.span(), url = %self.url, error = %e, "Failed reading response body");
            String::new()
        });

        Err(OutputError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, OutputError> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).map_err(OutputError::Compression)?;
    encoder.finish().map_err(OutputError::Compression)
}

/// Build the HTTP client, applying outbound TLS settings when given
fn build_client(tls: Option<&ClientTlsConfig>) -> Result<reqwest::Client, ContractError> {
    let mut builder = reqwest::Client::builder().timeout(HTTP_CLIENT_TIMEOUT);

    if let Some(tls) = tls {
        builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_2);

        if let Some(ca_file) = &tls.ca_file {
            let pem = read_pem(ca_file, "CA certificate")?;
            let roots = reqwest::Certificate::from_pem_bundle(&pem)
                .ok()
                .filter(|certs| !certs.is_empty())
                .ok_or_else(|| {
                    ContractError::Other(format!(
                        "failed to parse CA certificate {}",
                        ca_file.display()
                    ))
                })?;

            // 只信任配置的 CA
            builder = builder.tls_built_in_root_certs(false);
            for root in roots {
                builder = builder.add_root_certificate(root);
            }
        }

        if let (Some(cert_file), Some(key_file)) = (&tls.cert_file, &tls.key_file) {
            let mut pem = read_pem(cert_file, "client certificate")?;
            pem.push(b'\n');
            pem.extend(read_pem(key_file, "client key")?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                ContractError::Other(format!("failed to load client certificate: {e}"))
            })?;
            builder = builder.identity(identity);
        }
    }

    builder
        .build()
        .map_err(|e| ContractError::Other(format!("failed to create HTTP client: {e}")))
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, ContractError> {
    std::fs::read(path).map_err(|e| {
        ContractError::Other(format!(
            "failed to read {what} file {}: {e}",
            path.display()
        ))
    })
}
