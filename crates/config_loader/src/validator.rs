//! 配置校验模块
//!
//! 校验规则：
//! - server.port 必填，且与 metricsPort 不同
//! - server.tls 证书与私钥必填
//! - 至少一个 output，且每个 output 恰好配置一种类型
//! - HTTP output 的 URL 必须为 https，且不含 query / fragment / user info
//! - output TLS 的 certFile 与 keyFile 必须同时出现
//! - injectAnnotations 的 key 必须为合法的限定名，value 不能为空
//!
//! 与逐项失败不同，这里收集全部错误后一次性返回。

use std::path::Path;

use contracts::{
    ClientTlsConfig, ContractError, FieldErrors, ForwarderConfig, HttpOutputConfig, OutputConfig,
    ServerConfig,
};
use url::Url;

/// 注解总大小上限 (key + value)
const TOTAL_ANNOTATION_SIZE_LIMIT: usize = 256 * 1024;

const QUALIFIED_NAME_MAX_LEN: usize = 63;
const DNS_SUBDOMAIN_MAX_LEN: usize = 253;

/// 校验 ForwarderConfig 配置
///
/// 返回全部违规项，或 Ok(())。
pub fn validate(config: &ForwarderConfig) -> Result<(), ContractError> {
    let mut errors = FieldErrors::default();

    validate_server(&config.server, "server", &mut errors);
    validate_outputs(&config.outputs, "outputs", &mut errors);
    validate_inject_annotations(config, "injectAnnotations", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ContractError::ConfigValidation(errors))
    }
}

/// 校验服务端配置
fn validate_server(server: &ServerConfig, path: &str, errors: &mut FieldErrors) {
    if server.port == 0 {
        errors.push(format!("{path}.port"), "port is required");
    } else if server.port == server.metrics_port {
        errors.push(
            format!("{path}.metricsPort"),
            format!("metricsPort must differ from port ({})", server.port),
        );
    }

    if is_blank(&server.tls.cert_file) {
        errors.push(
            format!("{path}.tls.certFile"),
            "TLS certificate file is required",
        );
    }
    if is_blank(&server.tls.key_file) {
        errors.push(
            format!("{path}.tls.keyFile"),
            "TLS private key file is required",
        );
    }
    if server.tls.client_ca_file.as_deref().is_some_and(is_blank) {
        errors.push(
            format!("{path}.tls.clientCAFile"),
            "clientCAFile must not be blank when set",
        );
    }
}

/// 校验 outputs 列表
fn validate_outputs(outputs: &[OutputConfig], path: &str, errors: &mut FieldErrors) {
    if outputs.is_empty() {
        errors.push(path, "at least one output must be configured");
        return;
    }

    for (idx, output) in outputs.iter().enumerate() {
        let output_path = format!("{path}[{idx}]");
        match &output.http {
            Some(http) => validate_http_output(http, &format!("{output_path}.http"), errors),
            None => errors.push(
                output_path,
                "output type must be specified (currently only 'http' is supported)",
            ),
        }
    }
}

/// 校验单个 HTTP output
fn validate_http_output(http: &HttpOutputConfig, path: &str, errors: &mut FieldErrors) {
    let url_path = format!("{path}.url");
    let raw = http.url.trim();

    if raw.is_empty() {
        errors.push(url_path, "URL is required for HTTP output");
    } else {
        match Url::parse(raw) {
            Err(e) => errors.push(url_path, format!("invalid URL format '{raw}': {e}")),
            Ok(url) => {
                if url.scheme() != "https" {
                    errors.push(&url_path, format!("URL scheme must be 'https': {raw}"));
                }
                if url.query().is_some() {
                    errors.push(&url_path, "URL must not contain query parameters");
                }
                if url.fragment().is_some() {
                    errors.push(&url_path, "URL must not contain fragments");
                }
                if !url.username().is_empty() || url.password().is_some() {
                    errors.push(&url_path, "URL must not contain user information");
                }
            }
        }
    }

    if let Some(tls) = &http.tls {
        validate_client_tls(tls, &format!("{path}.tls"), errors);
    }
}

/// 校验客户端 TLS：证书与私钥必须成对出现
fn validate_client_tls(tls: &ClientTlsConfig, path: &str, errors: &mut FieldErrors) {
    let cert = tls.cert_file.as_deref().is_some_and(|p| !is_blank(p));
    let key = tls.key_file.as_deref().is_some_and(|p| !is_blank(p));

    if cert && !key {
        errors.push(
            format!("{path}.keyFile"),
            "keyFile is required when certFile is specified",
        );
    }
    if !cert && key {
        errors.push(
            format!("{path}.certFile"),
            "certFile is required when keyFile is specified",
        );
    }
}

/// 校验注入注解
fn validate_inject_annotations(config: &ForwarderConfig, path: &str, errors: &mut FieldErrors) {
    let mut total_size = 0usize;

    for (key, value) in &config.inject_annotations {
        let key_path = format!("{path}[{key}]");
        total_size += key.len() + value.len();

        if let Err(message) = validate_qualified_name(key) {
            errors.push(&key_path, message);
        }
        if value.trim().is_empty() {
            errors.push(&key_path, "annotation value cannot be empty");
        }
    }

    if total_size > TOTAL_ANNOTATION_SIZE_LIMIT {
        errors.push(
            path,
            format!(
                "annotations size {total_size} must have at most {TOTAL_ANNOTATION_SIZE_LIMIT} bytes"
            ),
        );
    }
}

/// 校验限定名：`[prefix/]name`
///
/// prefix 为 DNS 子域名；name 最长 63 字符，由字母数字、`-`、`_`、`.` 组成，
/// 且以字母数字开头和结尾。
fn validate_qualified_name(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err(format!("invalid key '{key}': prefix part must be non-empty"));
        }
        if !is_dns_subdomain(prefix) {
            return Err(format!(
                "invalid key '{key}': prefix part must be a lowercase RFC 1123 subdomain"
            ));
        }
    }

    if name.is_empty() {
        return Err(format!("invalid key '{key}': name part must be non-empty"));
    }
    if name.len() > QUALIFIED_NAME_MAX_LEN {
        return Err(format!(
            "invalid key '{key}': name part must be no more than {QUALIFIED_NAME_MAX_LEN} characters"
        ));
    }

    let bytes = name.as_bytes();
    let valid_chars = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    let valid_edges =
        bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();

    if !valid_chars || !valid_edges {
        return Err(format!(
            "invalid key '{key}': name part must consist of alphanumeric characters, '-', '_' or '.', \
             and must start and end with an alphanumeric character"
        ));
    }

    Ok(())
}

fn is_dns_subdomain(value: &str) -> bool {
    value.len() <= DNS_SUBDOMAIN_MAX_LEN && value.split('.').all(is_dns_label)
}

fn is_dns_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= QUALIFIED_NAME_MAX_LEN
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}

fn is_blank(path: &Path) -> bool {
    path.to_string_lossy().trim().is_empty()
}
