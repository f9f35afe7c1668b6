//! Dispatcher - concurrent fan-out to outputs

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use contracts::{Output, OutputConfig, OutputError, RequestContext};

use crate::error::{DispatcherError, ForwardError, OutputFailure};
use crate::handle::OutputHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::HttpOutput;

/// Create a single output from its descriptor
#[instrument(name = "dispatcher_create_output", skip(config))]
pub fn output_from_config(config: &OutputConfig) -> Result<Arc<dyn Output>, String> {
    match &config.http {
        Some(http) => {
            let output = HttpOutput::new(http).map_err(|e| e.to_string())?;
            Ok(Arc::new(output))
        }
        None => Err("no supported output type configured".to_string()),
    }
}

/// Create outputs from descriptors, in configured order
///
/// # Errors
/// Fails on the first descriptor that cannot be built, naming its index.
#[instrument(
    name = "dispatcher_create_outputs",
    skip(configs),
    fields(output_count = configs.len())
)]
pub fn outputs_from_configs(
    configs: &[OutputConfig],
) -> Result<Vec<Arc<dyn Output>>, DispatcherError> {
    configs
        .iter()
        .enumerate()
        .map(|(index, config)| {
            output_from_config(config)
                .map_err(|message| DispatcherError::output_creation(index, message))
        })
        .collect()
}

/// Convenience function to create a dispatcher from output configs
pub fn create_dispatcher(configs: &[OutputConfig]) -> Result<Dispatcher, DispatcherError> {
    Dispatcher::new(outputs_from_configs(configs)?)
}

/// Forwarding stage
///
/// Holds the immutable output set. Every `forward` call delivers the payload
/// to all outputs and waits for all of them, even after a failure.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handles: Vec<OutputHandle>,
}

impl Dispatcher {
    /// Create a dispatcher over `outputs`
    ///
    /// # Errors
    /// Returns [`DispatcherError::NoOutputs`] if `outputs` is empty.
    pub fn new(outputs: Vec<Arc<dyn Output>>) -> Result<Self, DispatcherError> {
        if outputs.is_empty() {
            return Err(DispatcherError::NoOutputs);
        }

        let handles: Vec<_> = outputs.into_iter().map(OutputHandle::new).collect();
        info!(
            outputs = ?handles.iter().map(OutputHandle::name).collect::<Vec<_>>(),
            "Dispatcher created"
        );

        Ok(Self { handles })
    }

    /// Number of outputs
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Get metrics for all outputs
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver `payload` to every output
    ///
    /// # Errors
    /// Returns a [`ForwardError`] listing every failed output, ordered by
    /// configured position, if at least one output failed.
    #[instrument(
        name = "dispatcher_forward",
        parent = ctx.span(),
        skip(self, ctx, payload),
        fields(outputs = self.handles.len(), bytes = payload.len())
    )]
    pub async fn forward(&self, ctx: &RequestContext, payload: Bytes) -> Result<(), ForwardError> {
        // 单个 output 直接在当前任务中发送
        if let [handle] = self.handles.as_slice() {
            return handle.send(ctx, payload).await.map_err(|error| {
                ForwardError::new(vec![OutputFailure {
                    output: handle.name().to_string(),
                    error,
                }])
            });
        }

        let mut results: Vec<Option<Result<(), OutputError>>> =
            std::iter::repeat_with(|| None).take(self.handles.len()).collect();
        let mut task_index = HashMap::with_capacity(self.handles.len());
        let mut tasks = JoinSet::new();

        for (index, handle) in self.handles.iter().enumerate() {
            let handle = handle.clone();
            let ctx = ctx.clone();
            let payload = payload.clone();
            let abort = tasks.spawn(async move { (index, handle.send(&ctx, payload).await) });
            task_index.insert(abort.id(), index);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(join_err) => {
                    error!(error = %join_err, "Output task failed");
                    if let Some(&index) = task_index.get(&join_err.id()) {
                        results[index] = Some(Err(OutputError::transport(
                            "output task failed",
                            join_err,
                        )));
                    }
                }
            }
        }

        let failures: Vec<OutputFailure> = self
            .handles
            .iter()
            .zip(results)
            .filter_map(|(handle, result)| match result {
                Some(Ok(())) => None,
                Some(Err(error)) => Some(OutputFailure {
                    output: handle.name().to_string(),
                    error,
                }),
                None => Some(OutputFailure {
                    output: handle.name().to_string(),
                    error: OutputError::Cancelled,
                }),
            })
            .collect();

        if failures.is_empty() {
            debug!("Payload delivered to all outputs");
            Ok(())
        } else {
            Err(ForwardError::new(failures))
        }
    }
}
