//! AnnotationInjector - 给每个审计事件注入固定注解
//!
//! 配置的注解覆盖事件中已有的同名注解，其余注解保持不变。

use async_trait::async_trait;
use bytes::Bytes;
use contracts::{Annotations, EventList, ProcessError, Processor, RequestContext};
use tracing::debug;

/// Processor name reported in errors and logs
pub const ANNOTATION_INJECTOR_NAME: &str = "audit-event-annotation-injector";

/// Merges a fixed annotation map into every event of the list
#[derive(Debug, Clone)]
pub struct AnnotationInjector {
    annotations: Annotations,
}

impl AnnotationInjector {
    pub fn new(annotations: Annotations) -> Self {
        Self { annotations }
    }
}

#[async_trait]
impl Processor for AnnotationInjector {
    fn name(&self) -> &str {
        ANNOTATION_INJECTOR_NAME
    }

    async fn process(&self, ctx: &RequestContext, payload: Bytes) -> Result<Bytes, ProcessError> {
        // 无注解时不解码，原样返回
        if self.annotations.is_empty() {
            return Ok(payload);
        }

        if ctx.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let mut list = EventList::decode(&payload)?;
        for event in &mut list.items {
            event.merge_annotations(&self.annotations);
        }

        debug!(
            parent: ctx.span(),
            events = list.items.len(),
            annotations = self.annotations.len(),
            "Injected annotations"
        );

        Ok(Bytes::from(list.encode()?))
    }
}
