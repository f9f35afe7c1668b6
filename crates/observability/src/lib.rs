//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus recorder 安装，由 server 在 metrics 端口暴露
//! - 请求计数器 (received / succeeded / failed)
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{ObservabilityConfig, RequestMetrics};
//!
//! observability::init_with_config(ObservabilityConfig::from_log_config(&config.log))?;
//! let handle = observability::install_metrics_recorder()?;
//!
//! let metrics = RequestMetrics::new();
//! metrics.record_received();
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use contracts::LogConfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{
    describe_request_metrics, RequestMetrics, RequestMetricsSnapshot, METRIC_FAILED,
    METRIC_RECEIVED, METRIC_SUCCEEDED,
};

/// 初始化 Tracing（JSON 格式，info 级别）
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// 默认日志级别 (RUST_LOG 优先)
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 从配置文件的 `log` 段构建
    ///
    /// `text` 对应紧凑单行格式。
    pub fn from_log_config(log: &LogConfig) -> Self {
        let log_format = match log.format {
            contracts::LogFormat::Json => LogFormat::Json,
            contracts::LogFormat::Text => LogFormat::Compact,
        };
        Self {
            log_format,
            default_log_level: log.level.as_str().to_string(),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 使用自定义配置初始化 Tracing
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    tracing::info!(
        log_format = ?config.log_format,
        log_level = %config.default_log_level,
        "Observability initialized"
    );

    Ok(())
}

/// 安装全局 Prometheus recorder
///
/// 返回的 handle 用于渲染 `/metrics` 响应；监听端口由 server 负责。
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    describe_request_metrics();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}
