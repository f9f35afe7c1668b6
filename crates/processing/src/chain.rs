//! ProcessorChain - sequential payload transformation
//!
//! - Processors run in configured order, each receiving the output of the previous one
//! - First error stops the chain; later processors never see possibly inconsistent output
//! - An empty chain passes the payload through untouched

use bytes::Bytes;
use contracts::{ProcessError, Processor, RequestContext};
use tracing::{debug, instrument};

use crate::PipelineError;

/// Ordered list of processors
///
/// Immutable once built and shared read-only between concurrent requests.
#[derive(Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    /// Create a chain running `processors` in the given order
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self { processors }
    }

    /// Create an empty chain (payload passes through unchanged)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Names of the processors in execution order
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Run the payload through every processor
    ///
    /// # Errors
    /// Returns the first processor error, tagged with the processor name.
    /// A cancelled context stops the chain before the next processor starts.
    #[instrument(
        name = "processor_chain_run",
        parent = ctx.span(),
        skip(self, ctx, payload),
        fields(processors = self.processors.len(), bytes = payload.len())
    )]
    pub async fn run(&self, ctx: &RequestContext, payload: Bytes) -> Result<Bytes, PipelineError> {
        let mut current = payload;

        for processor in &self.processors {
            if ctx.is_cancelled() {
                return Err(PipelineError::new(processor.name(), ProcessError::Cancelled));
            }

            current = processor
                .process(ctx, current)
                .await
                .map_err(|source| PipelineError::new(processor.name(), source))?;

            debug!(
                processor = processor.name(),
                bytes = current.len(),
                "Processor finished"
            );
        }

        Ok(current)
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.names())
            .finish()
    }
}
