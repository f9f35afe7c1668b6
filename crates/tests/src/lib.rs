//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 → 处理链 → 真实 HttpOutput → 本地 sink 的完整链路
//! - TLS / mTLS 接入与优雅关闭

#[cfg(test)]
mod support;

#[cfg(test)]
mod forwarding_tests;

#[cfg(test)]
mod server_tests;
