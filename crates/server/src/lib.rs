//! # Server
//!
//! HTTPS 接入模块。
//!
//! 负责：
//! - `POST /audit` 请求处理：读取 body → 处理链 → Fan-out 转发 → 响应 + 指标
//! - TLS 监听（可选客户端证书校验）
//! - metrics 监听（`GET /metrics`）
//! - 优雅关闭：停止接收新请求，宽限期后取消所有在途请求
//! - 调试用 echo sink

pub mod echo;
pub mod error;
pub mod handler;
pub mod server;
pub mod tls;

pub use echo::{echo_router, serve_echo, EchoOptions};
pub use error::ServerError;
pub use handler::{audit_router, AuditHandler, ErrorBody, BODY_READ_TIMEOUT, MAX_BODY_BYTES};
pub use server::{metrics_router, AuditServer, SHUTDOWN_GRACE_PERIOD};
pub use tls::{load_server_config, TlsListener};
