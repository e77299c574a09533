//! Graphics pipeline resource.

use std::sync::Arc;

use crate::backend::{GpuBackend, NativeResource, PipelineHandle};
use crate::types::{GraphicsPipelineDescriptor, PrimitiveType, TextureFormat};

/// A compiled graphics pipeline.
///
/// Created by [`Device::create_graphics_pipeline`] and bound inside a
/// [`RenderPass`](crate::RenderPass) before drawing.
///
/// [`Device::create_graphics_pipeline`]: crate::Device::create_graphics_pipeline
pub struct GraphicsPipeline {
    backend: Arc<dyn GpuBackend>,
    handle: PipelineHandle,
    label: Option<String>,
    primitive_type: PrimitiveType,
    color_target_formats: Vec<TextureFormat>,
}

impl GraphicsPipeline {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        handle: PipelineHandle,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Self {
        Self {
            backend,
            handle,
            label: descriptor.label.clone(),
            primitive_type: descriptor.primitive_type,
            color_target_formats: descriptor.color_target_formats.clone(),
        }
    }

    /// Get the native handle.
    pub fn handle(&self) -> PipelineHandle {
        self.handle
    }

    /// Get the pipeline label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Primitive topology the pipeline draws.
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    /// Formats of the color targets the pipeline renders to.
    pub fn color_target_formats(&self) -> &[TextureFormat] {
        &self.color_target_formats
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.backend
            .release_resource(NativeResource::Pipeline(self.handle));
    }
}

impl std::fmt::Debug for GraphicsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsPipeline")
            .field("handle", &self.handle)
            .field("label", &self.label)
            .field("primitive_type", &self.primitive_type)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsPipeline: Send, Sync);
