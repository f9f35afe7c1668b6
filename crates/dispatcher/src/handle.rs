//! OutputHandle - an output together with its delivery metrics

use std::sync::Arc;

use bytes::Bytes;
use contracts::{Output, OutputError, RequestContext};
use tracing::{debug, instrument, warn};

use crate::metrics::OutputMetrics;

/// Handle to a configured output
///
/// Cheap to clone; clones share the output and its metrics.
#[derive(Clone)]
pub struct OutputHandle {
    /// Output name
    name: String,
    output: Arc<dyn Output>,
    /// Shared metrics
    metrics: Arc<OutputMetrics>,
}

impl OutputHandle {
    /// Wrap an output
    pub fn new(output: Arc<dyn Output>) -> Self {
        Self {
            name: output.name().to_string(),
            output,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    /// Get output name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<OutputMetrics> {
        &self.metrics
    }

    /// Deliver the payload and record the outcome
    #[instrument(
        name = "output_send",
        parent = ctx.span(),
        skip(self, ctx, payload),
        fields(output = %self.name, bytes = payload.len())
    )]
    pub async fn send(&self, ctx: &RequestContext, payload: Bytes) -> Result<(), OutputError> {
        match self.output.send(ctx, payload).await {
            Ok(()) => {
                self.metrics.inc_send_count();
                debug!("Payload delivered");
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                if e.is_cancelled() {
                    self.metrics.inc_cancelled_count();
                }
                warn!(error = %e, "Output send failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputHandle")
            .field("name", &self.name)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
