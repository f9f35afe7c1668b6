//! Processing pipeline error types

use contracts::ProcessError;
use thiserror::Error;

/// A processor in the chain failed
#[derive(Debug, Error)]
#[error("processor '{processor}' failed: {source}")]
pub struct PipelineError {
    /// Name of the failing processor
    pub processor: String,
    /// Underlying processor error
    #[source]
    pub source: ProcessError,
}

impl PipelineError {
    pub fn new(processor: impl Into<String>, source: ProcessError) -> Self {
        Self {
            processor: processor.into(),
            source,
        }
    }
}
