//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{Compression, ForwarderConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    log: LogInfo,
    server: ServerInfo,
    outputs: Vec<OutputInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    inject_annotations: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct LogInfo {
    level: String,
    format: String,
}

#[derive(Serialize)]
struct ServerInfo {
    audit_addr: String,
    metrics_addr: String,
    cert_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ca_file: Option<String>,
}

#[derive(Serialize)]
struct OutputInfo {
    kind: &'static str,
    url: String,
    compression: &'static str,
    mutual_tls: bool,
    custom_ca: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &ForwarderConfig) -> ConfigInfo {
    let outputs = config
        .outputs
        .iter()
        .filter_map(|output| output.http.as_ref())
        .map(|http| {
            let tls = http.tls.as_ref();
            OutputInfo {
                kind: "http",
                url: http.url.clone(),
                compression: match http.compression {
                    Compression::None => "none",
                    Compression::Gzip => "gzip",
                },
                mutual_tls: tls.is_some_and(|t| t.cert_file.is_some() && t.key_file.is_some()),
                custom_ca: tls.is_some_and(|t| t.ca_file.is_some()),
            }
        })
        .collect();

    ConfigInfo {
        log: LogInfo {
            level: config.log.level.as_str().to_string(),
            format: format!("{:?}", config.log.format).to_lowercase(),
        },
        server: ServerInfo {
            audit_addr: config.server.audit_addr(),
            metrics_addr: config.server.metrics_addr(),
            cert_file: config.server.tls.cert_file.display().to_string(),
            client_ca_file: config
                .server
                .tls
                .client_ca_file
                .as_ref()
                .map(|p| p.display().to_string()),
        },
        outputs,
        inject_annotations: config.inject_annotations.clone(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Auditlog Forwarder Configuration ===\n");

    println!("Log:");
    println!("  Level: {}", info.log.level);
    println!("  Format: {}", info.log.format);

    println!("\nServer:");
    println!("  Audit listener: {} (POST /audit)", info.server.audit_addr);
    println!("  Metrics listener: {} (GET /metrics)", info.server.metrics_addr);
    println!("  Certificate: {}", info.server.cert_file);
    match &info.server.client_ca_file {
        Some(ca) => println!("  Client CA: {}", ca),
        None => println!("  Client CA: (not verified)"),
    }

    println!("\nOutputs ({}):", info.outputs.len());
    for output in &info.outputs {
        let mut flags = vec![format!("compression={}", output.compression)];
        if output.custom_ca {
            flags.push("custom-ca".to_string());
        }
        if output.mutual_tls {
            flags.push("mtls".to_string());
        }
        println!("  - [{}] {} ({})", output.kind, output.url, flags.join(", "));
    }

    if !info.inject_annotations.is_empty() {
        println!("\nInjected annotations ({}):", info.inject_annotations.len());
        for (key, value) in &info.inject_annotations {
            println!("  {}: {}", key, value);
        }
    }

    println!();
}
