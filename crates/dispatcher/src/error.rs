//! Dispatcher error types

use std::fmt;

use contracts::OutputError;
use thiserror::Error;

/// Dispatcher construction errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Dispatcher needs at least one output
    #[error("no outputs configured")]
    NoOutputs,

    /// Output creation error
    #[error("failed to create output at index {index}: {message}")]
    OutputCreation { index: usize, message: String },
}

impl DispatcherError {
    /// Create an output creation error
    pub fn output_creation(index: usize, message: impl Into<String>) -> Self {
        Self::OutputCreation {
            index,
            message: message.into(),
        }
    }
}

/// One failed delivery
#[derive(Debug)]
pub struct OutputFailure {
    /// Name of the failing output (its URL for HTTP outputs)
    pub output: String,
    /// Underlying error
    pub error: OutputError,
}

impl fmt::Display for OutputFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output '{}': {}", self.output, self.error)
    }
}

/// Aggregate error of one fan-out
///
/// Failures are ordered by configured output position. Outputs that are not
/// listed received the payload.
#[derive(Debug, Error)]
pub struct ForwardError {
    failures: Vec<OutputFailure>,
}

impl ForwardError {
    pub fn new(failures: Vec<OutputFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[OutputFailure] {
        &self.failures
    }

    /// Names of the failing outputs
    pub fn output_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.output.as_str()).collect()
    }

    /// Whether every failure was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        !self.failures.is_empty() && self.failures.iter().all(|f| f.error.is_cancelled())
    }
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to forward to {} output(s): ", self.failures.len())?;
        for (idx, failure) in self.failures.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}
