//! Render pass recording scope.
//!
//! A [`RenderPass`] is opened with [`CommandBuffer::begin_render_pass`] and
//! mutably borrows its command buffer until it ends, so it can never outlive
//! the buffer and no second pass can be opened meanwhile.
//!
//! The per-pass state lives in a [`RenderPassState`] leased from the device's
//! render-pass pool and parked in the command buffer while the pass is open.
//! That lets the command buffer force-end a pass the caller never ended.
//!
//! [`CommandBuffer::begin_render_pass`]: crate::CommandBuffer::begin_render_pass

use std::sync::Arc;

use lilium_core::pool::Poolable;

use crate::backend::{GpuBackend, RenderPassHandle};
use crate::command_buffer::{ActivePass, CommandRecording};
use crate::error::GpuError;
use crate::resources::{DataBuffer, GraphicsPipeline, Sampler, Texture};
use crate::types::{BufferUsage, IndexElementSize, ScissorRect, TextureUsage, Viewport};

/// Pooled state of an open render pass.
pub(crate) struct RenderPassState {
    backend: Arc<dyn GpuBackend>,
    handle: Option<RenderPassHandle>,
    pipeline_bound: bool,
}

impl RenderPassState {
    pub(crate) fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            handle: None,
            pipeline_bound: false,
        }
    }

    pub(crate) fn open(&mut self, handle: RenderPassHandle) {
        debug_assert!(self.handle.is_none(), "render pass state leased while open");
        self.handle = Some(handle);
        self.pipeline_bound = false;
    }

    /// End the native pass. No-op if already ended.
    pub(crate) fn end(&mut self) {
        // Cleared before the native call so a panicking backend can't cause
        // a second end.
        if let Some(handle) = self.handle.take() {
            self.backend.end_render_pass(handle);
        }
    }

    pub(crate) fn handle(&self) -> Option<RenderPassHandle> {
        self.handle
    }
}

impl Poolable for RenderPassState {
    fn reset(&mut self) {
        self.end();
        self.pipeline_bound = false;
    }

    fn dispose(&mut self) {
        self.end();
    }
}

/// An open render pass.
///
/// Ends when [`end`](Self::end) is called or when dropped.
///
/// # Example
///
/// ```ignore
/// let mut pass = cmd.begin_render_pass(None, &[ColorTargetInfo::new(&swapchain)])?;
/// pass.bind_pipeline(&pipeline);
/// pass.bind_vertex_buffer(0, &vertices, 0)?;
/// pass.draw_primitives(3, 1, 0, 0)?;
/// pass.end();
/// ```
pub struct RenderPass<'a> {
    recording: &'a mut CommandRecording,
}

impl<'a> RenderPass<'a> {
    pub(crate) fn new(recording: &'a mut CommandRecording) -> Self {
        Self { recording }
    }

    fn state(&self) -> &RenderPassState {
        match self.recording.active_pass() {
            Some(ActivePass::Render(state)) => &**state,
            _ => unreachable!("render pass scope without an open render pass"),
        }
    }

    fn state_mut(&mut self) -> &mut RenderPassState {
        match self.recording.active_pass_mut() {
            Some(ActivePass::Render(state)) => &mut **state,
            _ => unreachable!("render pass scope without an open render pass"),
        }
    }

    /// Native handle of the pass.
    pub fn handle(&self) -> RenderPassHandle {
        match self.state().handle() {
            Some(handle) => handle,
            None => unreachable!("open render pass without a native handle"),
        }
    }

    /// Check whether a pipeline has been bound in this pass.
    pub fn is_pipeline_bound(&self) -> bool {
        self.state().pipeline_bound
    }

    /// Bind a graphics pipeline. Required before any draw.
    pub fn bind_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        let handle = self.handle();
        let state = self.state_mut();
        state.backend.bind_graphics_pipeline(handle, pipeline.handle());
        state.pipeline_bound = true;
    }

    /// Bind a vertex buffer to `slot`, starting at byte `offset`.
    pub fn bind_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &DataBuffer,
        offset: u64,
    ) -> Result<(), GpuError> {
        buffer.check_binding(BufferUsage::VERTEX, offset)?;
        let handle = self.handle();
        self.state()
            .backend
            .bind_vertex_buffer(handle, slot, buffer.handle(), offset);
        Ok(())
    }

    /// Bind the index buffer, starting at byte `offset`.
    pub fn bind_index_buffer(
        &mut self,
        buffer: &DataBuffer,
        offset: u64,
        element_size: IndexElementSize,
    ) -> Result<(), GpuError> {
        buffer.check_binding(BufferUsage::INDEX, offset)?;
        if offset % element_size.bytes() != 0 {
            return Err(GpuError::InvalidParameter(format!(
                "index buffer offset {offset} is not aligned to {element_size:?}"
            )));
        }
        let handle = self.handle();
        self.state()
            .backend
            .bind_index_buffer(handle, buffer.handle(), offset, element_size);
        Ok(())
    }

    /// Bind a texture and sampler to a fragment sampler slot.
    ///
    /// The texture must have been created with [`TextureUsage::SAMPLER`].
    pub fn bind_fragment_sampler(
        &mut self,
        slot: u32,
        texture: &Texture,
        sampler: &Sampler,
    ) -> Result<(), GpuError> {
        if !texture.usage().contains(TextureUsage::SAMPLER) {
            return Err(GpuError::InvalidParameter(format!(
                "texture {:?} was not created with SAMPLER usage",
                texture.label()
            )));
        }
        let handle = self.handle();
        self.state()
            .backend
            .bind_fragment_sampler(handle, slot, texture.handle(), sampler.handle());
        Ok(())
    }

    /// Set the viewport.
    pub fn set_viewport(&mut self, viewport: &Viewport) {
        let handle = self.handle();
        self.state().backend.set_viewport(handle, viewport);
    }

    /// Set the scissor rectangle.
    pub fn set_scissor(&mut self, scissor: &ScissorRect) {
        let handle = self.handle();
        self.state().backend.set_scissor(handle, scissor);
    }

    /// Set the stencil reference value.
    pub fn set_stencil_reference(&mut self, reference: u8) {
        let handle = self.handle();
        self.state().backend.set_stencil_reference(handle, reference);
    }

    /// Draw non-indexed primitives with the bound pipeline.
    ///
    /// Fails with [`GpuError::PipelineNotBound`] if no pipeline was bound in
    /// this pass; the driver does not check this itself.
    pub fn draw_primitives(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), GpuError> {
        self.ensure_pipeline_bound()?;
        let handle = self.handle();
        self.state().backend.draw_primitives(
            handle,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        );
        Ok(())
    }

    /// Draw indexed primitives with the bound pipeline and index buffer.
    ///
    /// Fails with [`GpuError::PipelineNotBound`] if no pipeline was bound in
    /// this pass.
    pub fn draw_indexed_primitives(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<(), GpuError> {
        self.ensure_pipeline_bound()?;
        let handle = self.handle();
        self.state().backend.draw_indexed_primitives(
            handle,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
        Ok(())
    }

    /// End the pass.
    pub fn end(self) {
        // Drop does the work.
    }

    fn ensure_pipeline_bound(&self) -> Result<(), GpuError> {
        if self.state().pipeline_bound {
            Ok(())
        } else {
            Err(GpuError::PipelineNotBound)
        }
    }
}

impl Drop for RenderPass<'_> {
    fn drop(&mut self) {
        self.recording.end_active_pass();
    }
}

impl std::fmt::Debug for RenderPass<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("handle", &self.handle())
            .field("pipeline_bound", &self.is_pipeline_bound())
            .finish()
    }
}
