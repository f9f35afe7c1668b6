//! # Processing
//!
//! Processing pipeline module.
//!
//! Responsibilities:
//! - Run the configured processors in order over the raw request body
//! - Stop at the first failing processor and name it
//! - Provide the annotation injector processor

pub mod annotation;
pub mod chain;
pub mod error;

pub use annotation::{AnnotationInjector, ANNOTATION_INJECTOR_NAME};
pub use chain::ProcessorChain;
pub use contracts::Processor;
pub use error::PipelineError;

use contracts::ForwarderConfig;

/// Build the processors described by the configuration
///
/// The annotation injector is only added when annotations are configured.
pub fn processors_from_config(config: &ForwarderConfig) -> Vec<Box<dyn Processor>> {
    let mut processors: Vec<Box<dyn Processor>> = Vec::new();
    if !config.inject_annotations.is_empty() {
        processors.push(Box::new(AnnotationInjector::new(
            config.inject_annotations.clone(),
        )));
    }
    processors
}
