//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{Compression, ForwarderConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    audit_addr: String,
    metrics_addr: String,
    mutual_tls: bool,
    output_count: usize,
    annotation_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            violations: Vec::new(),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                violations: Vec::new(),
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    audit_addr: config.server.audit_addr(),
                    metrics_addr: config.server.metrics_addr(),
                    mutual_tls: config.server.tls.client_ca_file.is_some(),
                    output_count: config.outputs.len(),
                    annotation_count: config.inject_annotations.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            violations: e
                .field_errors()
                .map(|errors| errors.iter().map(ToString::to_string).collect())
                .unwrap_or_default(),
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ForwarderConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.inject_annotations.is_empty() {
        warnings.push("injectAnnotations is empty - events are forwarded unchanged".to_string());
    }

    if config.server.tls.client_ca_file.is_none() {
        warnings.push(
            "server.tls.clientCAFile is not set - client certificates are not verified"
                .to_string(),
        );
    }

    let urls: Vec<&str> = config
        .outputs
        .iter()
        .filter_map(|o| o.http.as_ref().map(|h| h.url.as_str()))
        .collect();
    for (idx, url) in urls.iter().enumerate() {
        if urls[..idx].contains(url) {
            warnings.push(format!(
                "outputs[{idx}]: '{url}' is configured more than once - events are delivered twice"
            ));
        }
    }

    for (idx, output) in config.outputs.iter().enumerate() {
        if let Some(http) = &output.http {
            if http.compression == Compression::None && config.outputs.len() > 1 {
                warnings.push(format!(
                    "outputs[{idx}]: compression disabled - consider 'gzip' for large batches"
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Audit listener: {}", summary.audit_addr);
            println!("  Metrics listener: {}", summary.metrics_addr);
            println!("  Mutual TLS: {}", summary.mutual_tls);
            println!("  Outputs: {}", summary.output_count);
            println!("  Annotations: {}", summary.annotation_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if result.violations.is_empty() {
            if let Some(ref error) = result.error {
                println!("\n  Error: {}", error);
            }
        } else {
            println!();
            for violation in &result.violations {
                println!("  - {}", violation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config(
            r#"
server:
  tls:
    certFile: /tls/tls.crt
    keyFile: /tls/tls.key
outputs:
- http:
    url: https://a.example.com/audit
- http:
    url: https://a.example.com/audit
    compression: gzip
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("injectAnnotations is empty")));
        assert!(warnings.iter().any(|w| w.contains("configured more than once")));
        assert_eq!(result.summary.unwrap().output_count, 2);
    }

    #[test]
    fn test_invalid_config_lists_violations() {
        let file = write_config(
            r#"
server:
  tls:
    certFile: /tls/tls.crt
    keyFile: /tls/tls.key
outputs: []
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });

        assert!(!result.valid);
        assert!(result.violations.iter().any(|v| v.starts_with("outputs:")));
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/config.yaml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
