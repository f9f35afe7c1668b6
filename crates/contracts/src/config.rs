//! ForwarderConfig - Config Loader output
//!
//! Describes the complete forwarder configuration: logging, serving, outputs
//! and the annotations injected into every audit event.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default audit listener port
pub const DEFAULT_PORT: u16 = 10443;

/// Default metrics listener port
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Complete forwarder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwarderConfig {
    /// Informational, e.g. `config.auditlog-forwarder/v1alpha1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Informational, e.g. `AuditlogForwarder`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,

    /// Serving settings
    pub server: ServerConfig,

    /// Forwarding destinations
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,

    /// Annotations injected into every audit event
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inject_annotations: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose
    Debug,
    #[default]
    Info,
    /// Only errors are logged
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable text
    Text,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Listen address, empty means all interfaces
    #[serde(default)]
    pub address: String,

    /// Audit listener port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Metrics listener port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// TLS settings of the audit listener
    pub tls: ServerTlsConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

impl ServerConfig {
    /// `host:port` of the audit listener
    pub fn audit_addr(&self) -> String {
        join_host_port(&self.address, self.port)
    }

    /// `host:port` of the metrics listener
    pub fn metrics_addr(&self) -> String {
        join_host_port(&self.address, self.metrics_port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Inbound TLS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTlsConfig {
    /// PEM certificate chain
    #[serde(default)]
    pub cert_file: PathBuf,

    /// PEM private key matching the certificate
    #[serde(default)]
    pub key_file: PathBuf,

    /// CA used to verify client certificates; enables mutual TLS
    #[serde(default, rename = "clientCAFile", skip_serializing_if = "Option::is_none")]
    pub client_ca_file: Option<PathBuf>,
}

/// Output descriptor; exactly one type must be set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpOutputConfig>,
}

impl OutputConfig {
    /// Descriptor of an HTTP output
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            http: Some(HttpOutputConfig {
                url: url.into(),
                compression: Compression::None,
                tls: None,
            }),
        }
    }
}

/// HTTP output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOutputConfig {
    /// Endpoint the payload is POSTed to
    pub url: String,

    /// Request body compression
    #[serde(default)]
    pub compression: Compression,

    /// Outbound TLS materials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ClientTlsConfig>,
}

/// Request body compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    #[serde(alias = "")]
    None,
    Gzip,
}

/// Outbound TLS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTlsConfig {
    /// CA used to verify the remote server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    /// Client certificate for mutual TLS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,

    /// Client private key for mutual TLS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}
