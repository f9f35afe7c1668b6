//! 配置解析模块
//!
//! 支持 TOML、JSON 与 YAML 格式。

use contracts::{ContractError, ForwarderConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式
    Toml,
    /// JSON 格式
    Json,
    /// YAML 格式 (Kubernetes 风格配置)
    Yaml,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<ForwarderConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<ForwarderConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 YAML 格式配置
pub fn parse_yaml(content: &str) -> Result<ForwarderConfig, ContractError> {
    serde_yaml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("YAML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<ForwarderConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
        ConfigFormat::Yaml => parse_yaml(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Compression, LogFormat, LogLevel};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[server.tls]
certFile = "/tls/tls.crt"
keyFile = "/tls/tls.key"

[[outputs]]
[outputs.http]
url = "https://audit.example.com/ingest"
compression = "gzip"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.outputs.len(), 1);
        let http = config.outputs[0].http.as_ref().unwrap();
        assert_eq!(http.compression, Compression::Gzip);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "log": { "level": "debug", "format": "text" },
            "server": { "port": 8443, "tls": { "certFile": "c", "keyFile": "k" } },
            "outputs": [{ "http": { "url": "https://a.example.com" } }],
            "injectAnnotations": { "shoot.gardener.cloud/id": "abc" }
        }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.inject_annotations.len(), 1);
    }

    #[test]
    fn test_parse_yaml_kubernetes_style() {
        let content = r#"
apiVersion: config.auditlog-forwarder.gardener.cloud/v1alpha1
kind: AuditlogForwarder
log:
  level: error
server:
  address: 127.0.0.1
  tls:
    certFile: /tls/tls.crt
    keyFile: /tls/tls.key
    clientCAFile: /tls/ca.crt
outputs:
- http:
    url: https://audit.example.com
    tls:
      caFile: /out/ca.crt
      certFile: /out/tls.crt
      keyFile: /out/tls.key
injectAnnotations:
  shoot.gardener.cloud/name: test-shoot
"#;
        let config = parse_yaml(content).unwrap();
        assert_eq!(config.kind.as_deref(), Some("AuditlogForwarder"));
        assert_eq!(config.log.level, LogLevel::Error);
        assert!(config.server.tls.client_ca_file.is_some());
        let tls = config.outputs[0].http.as_ref().unwrap().tls.as_ref().unwrap();
        assert!(tls.ca_file.is_some() && tls.cert_file.is_some() && tls.key_file.is_some());
    }

    #[test]
    fn test_parse_unsupported_log_level() {
        let content = r#"{"log": {"level": "trace"}, "server": {"tls": {}}}"#;
        let err = parse_json(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("ini"), None);
    }
}
