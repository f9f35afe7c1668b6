//! 请求指标
//!
//! 每个请求恰好记录一次 received，以及 succeeded / failed 其中之一。

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, describe_counter};

/// 收到的审计请求总数
pub const METRIC_RECEIVED: &str = "auditlog_forwarder_audit_events_received_total";
/// 成功转发的审计请求总数
pub const METRIC_SUCCEEDED: &str = "auditlog_forwarder_audit_events_succeeded_total";
/// 失败的审计请求总数
pub const METRIC_FAILED: &str = "auditlog_forwarder_audit_events_failed_total";

/// 注册指标描述
pub fn describe_request_metrics() {
    describe_counter!(METRIC_RECEIVED, "Total number of received audit event requests");
    describe_counter!(
        METRIC_SUCCEEDED,
        "Total number of audit event requests forwarded to all outputs"
    );
    describe_counter!(METRIC_FAILED, "Total number of failed audit event requests");
}

/// 请求计数器
///
/// 同时写入 `metrics` facade（Prometheus 导出）和进程内原子计数（测试与关闭摘要）。
#[derive(Debug, Default)]
pub struct RequestMetrics {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求开始处理前调用
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_RECEIVED).increment(1);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_SUCCEEDED).increment(1);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_FAILED).increment(1);
    }

    /// 当前计数快照
    pub fn snapshot(&self) -> RequestMetricsSnapshot {
        RequestMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// 计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestMetricsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl RequestMetricsSnapshot {
    /// 已完成（成功或失败）的请求数
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

impl std::fmt::Display for RequestMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "received={} succeeded={} failed={}",
            self.received, self.succeeded, self.failed
        )
    }
}
