//! Processor trait - processing pipeline step interface

use async_trait::async_trait;
use bytes::Bytes;

use crate::{ProcessError, RequestContext};

/// Payload transformation step
///
/// Processors are configured once at startup and invoked concurrently by
/// different requests, so implementations must not mutate shared state.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Processor name (used for logging and pipeline errors)
    fn name(&self) -> &str;

    /// Transform the payload, returning the rewritten bytes
    async fn process(&self, ctx: &RequestContext, payload: Bytes) -> Result<Bytes, ProcessError>;
}
