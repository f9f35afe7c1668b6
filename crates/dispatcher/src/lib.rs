//! # Dispatcher
//!
//! 转发模块。
//!
//! 负责：
//! - 把处理后的 payload Fan-out 到所有 outputs
//! - 等待全部 outputs 完成，汇总失败为一个 `ForwardError`
//! - 根据配置创建 outputs（当前只有 HTTP）

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::Output;
pub use dispatcher::{create_dispatcher, output_from_config, outputs_from_configs, Dispatcher};
pub use error::{DispatcherError, ForwardError, OutputFailure};
pub use handle::OutputHandle;
pub use metrics::{MetricsSnapshot, OutputMetrics};
pub use sinks::{HttpOutput, HTTP_CLIENT_TIMEOUT};
