//! Output trait - forwarding stage destination interface
//!
//! Defines the abstract interface for outputs.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{OutputError, RequestContext};

/// Forwarding destination
///
/// All output implementations must implement this trait. Outputs are shared
/// read-only across requests and across the fan-out tasks of one request.
#[async_trait]
pub trait Output: Send + Sync {
    /// Output identity (used for logging and aggregate errors)
    fn name(&self) -> &str;

    /// Deliver the payload
    ///
    /// # Errors
    /// Returns delivery error. Must return [`OutputError::Cancelled`] promptly
    /// once `ctx` is cancelled.
    async fn send(&self, ctx: &RequestContext, payload: Bytes) -> Result<(), OutputError>;
}
