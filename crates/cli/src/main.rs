//! # Auditlog Forwarder CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 转发服务启动与生命周期管理
//! - 优雅关闭处理
//! - 调试用 echo sink

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use contracts::LogConfig;
use observability::ObservabilityConfig;

use cli::{Cli, Commands};
use commands::{run_echo, run_forwarder, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // run 在加载配置后再初始化日志（日志级别/格式来自配置文件）
    let result = match &cli.command {
        Commands::Run(args) => run_forwarder(&cli, args).await,
        Commands::Validate(args) => init_logging(&cli, None).and_then(|()| run_validate(args)),
        Commands::Info(args) => init_logging(&cli, None).and_then(|()| run_info(args)),
        Commands::Echo(args) => match init_logging(&cli, None) {
            Ok(()) => run_echo(args).await,
            Err(e) => Err(e),
        },
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging from the configuration's `log` section and CLI options
///
/// CLI flags win over the configuration; without a configuration the
/// compact format at info level is used.
pub(crate) fn init_logging(cli: &Cli, log: Option<&LogConfig>) -> Result<()> {
    let mut config = match log {
        Some(log) => ObservabilityConfig::from_log_config(log),
        None => ObservabilityConfig {
            log_format: observability::LogFormat::Compact,
            ..Default::default()
        },
    };

    if cli.quiet {
        config.default_log_level = "error".to_string();
    } else if cli.verbose > 0 {
        config.default_log_level = match cli.verbose {
            1 => "debug",
            _ => "trace",
        }
        .to_string();
    }

    if let Some(format) = cli.log_format {
        config.log_format = match format {
            cli::LogFormat::Json => observability::LogFormat::Json,
            cli::LogFormat::Pretty => observability::LogFormat::Pretty,
            cli::LogFormat::Compact => observability::LogFormat::Compact,
        };
    }

    observability::init_with_config(config)
}
