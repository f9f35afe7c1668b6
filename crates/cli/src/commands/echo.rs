//! `echo` command implementation.

use anyhow::{Context, Result};
use contracts::ServerTlsConfig;
use server::EchoOptions;

use super::setup_shutdown_signal;
use crate::cli::EchoArgs;

/// Execute the `echo` command
pub async fn run_echo(args: &EchoArgs) -> Result<()> {
    let tls = match (&args.tls_cert_file, &args.tls_key_file) {
        (Some(cert_file), Some(key_file)) => Some(ServerTlsConfig {
            cert_file: cert_file.clone(),
            key_file: key_file.clone(),
            client_ca_file: None,
        }),
        _ => None,
    };

    server::serve_echo(
        args.port,
        EchoOptions {
            log_body: args.log_body,
        },
        tls.as_ref(),
        setup_shutdown_signal(),
    )
    .await
    .context("Echo server failed")
}
