//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It mints handles,
//! keeps track of which command buffers and resources are alive, and records
//! every call so tests can assert on what reached the "driver". Failures can
//! be injected per operation with [`DummyBackend::fail_next`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::resources::SwapchainTexture;
use crate::types::{
    BufferDescriptor, ColorTargetInfo, DepthStencilTargetInfo, GraphicsPipelineDescriptor,
    IndexElementSize, SamplerDescriptor, ScissorRect, TextureDescriptor, TextureFormat,
    TransferBufferDescriptor, Viewport, WindowId,
};

use super::{
    BackendError, BufferHandle, BufferUpload, CommandBufferHandle, CopyPassHandle, GpuBackend,
    NativeResource, PipelineHandle, RenderPassHandle, SamplerHandle, TextureHandle,
    TextureUpload, TransferBufferHandle,
};

/// Size of the swapchain textures handed out by the dummy backend.
pub const DUMMY_SWAPCHAIN_SIZE: (u32, u32) = (1280, 720);

/// Every operation of [`GpuBackend`], used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateDataBuffer,
    CreateTransferBuffer,
    WriteTransferBuffer,
    CreateTexture,
    CreateSampler,
    CreateGraphicsPipeline,
    ReleaseResource,
    AcquireCommandBuffer,
    SubmitCommandBuffer,
    CancelCommandBuffer,
    AcquireSwapchainTexture,
    PushVertexUniformData,
    PushFragmentUniformData,
    BeginRenderPass,
    EndRenderPass,
    BindGraphicsPipeline,
    BindVertexBuffer,
    BindIndexBuffer,
    BindFragmentSampler,
    SetViewport,
    SetScissor,
    SetStencilReference,
    DrawPrimitives,
    DrawIndexedPrimitives,
    BeginCopyPass,
    EndCopyPass,
    UploadToBuffer,
    UploadToTexture,
}

/// A call that reached the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateResource(NativeResource),
    WriteTransferBuffer {
        buffer: TransferBufferHandle,
        offset: u64,
        len: usize,
    },
    ReleaseResource(NativeResource),
    AcquireCommandBuffer(CommandBufferHandle),
    SubmitCommandBuffer(CommandBufferHandle),
    CancelCommandBuffer(CommandBufferHandle),
    AcquireSwapchainTexture {
        command_buffer: CommandBufferHandle,
        window: WindowId,
    },
    PushVertexUniformData {
        command_buffer: CommandBufferHandle,
        slot: u32,
        data: Vec<u8>,
    },
    PushFragmentUniformData {
        command_buffer: CommandBufferHandle,
        slot: u32,
        data: Vec<u8>,
    },
    BeginRenderPass {
        command_buffer: CommandBufferHandle,
        pass: RenderPassHandle,
        color_targets: usize,
        depth_stencil: bool,
    },
    EndRenderPass(RenderPassHandle),
    BindGraphicsPipeline {
        pass: RenderPassHandle,
        pipeline: PipelineHandle,
    },
    BindVertexBuffer {
        pass: RenderPassHandle,
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    },
    BindIndexBuffer {
        pass: RenderPassHandle,
        buffer: BufferHandle,
        offset: u64,
        element_size: IndexElementSize,
    },
    BindFragmentSampler {
        pass: RenderPassHandle,
        slot: u32,
        texture: TextureHandle,
        sampler: SamplerHandle,
    },
    SetViewport(RenderPassHandle, Viewport),
    SetScissor(RenderPassHandle, ScissorRect),
    SetStencilReference(RenderPassHandle, u8),
    DrawPrimitives {
        pass: RenderPassHandle,
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexedPrimitives {
        pass: RenderPassHandle,
        index_count: u32,
        instance_count: u32,
    },
    BeginCopyPass {
        command_buffer: CommandBufferHandle,
        pass: CopyPassHandle,
    },
    EndCopyPass(CopyPassHandle),
    UploadToBuffer(CopyPassHandle, BufferUpload),
    UploadToTexture(CopyPassHandle, TextureUpload),
}

impl BackendCall {
    /// The operation this call belongs to.
    pub fn op(&self) -> BackendOp {
        match self {
            Self::CreateResource(NativeResource::Buffer(_)) => BackendOp::CreateDataBuffer,
            Self::CreateResource(NativeResource::TransferBuffer(_)) => {
                BackendOp::CreateTransferBuffer
            }
            Self::CreateResource(NativeResource::Texture(_)) => BackendOp::CreateTexture,
            Self::CreateResource(NativeResource::Sampler(_)) => BackendOp::CreateSampler,
            Self::CreateResource(NativeResource::Pipeline(_)) => {
                BackendOp::CreateGraphicsPipeline
            }
            Self::WriteTransferBuffer { .. } => BackendOp::WriteTransferBuffer,
            Self::ReleaseResource(_) => BackendOp::ReleaseResource,
            Self::AcquireCommandBuffer(_) => BackendOp::AcquireCommandBuffer,
            Self::SubmitCommandBuffer(_) => BackendOp::SubmitCommandBuffer,
            Self::CancelCommandBuffer(_) => BackendOp::CancelCommandBuffer,
            Self::AcquireSwapchainTexture { .. } => BackendOp::AcquireSwapchainTexture,
            Self::PushVertexUniformData { .. } => BackendOp::PushVertexUniformData,
            Self::PushFragmentUniformData { .. } => BackendOp::PushFragmentUniformData,
            Self::BeginRenderPass { .. } => BackendOp::BeginRenderPass,
            Self::EndRenderPass(_) => BackendOp::EndRenderPass,
            Self::BindGraphicsPipeline { .. } => BackendOp::BindGraphicsPipeline,
            Self::BindVertexBuffer { .. } => BackendOp::BindVertexBuffer,
            Self::BindIndexBuffer { .. } => BackendOp::BindIndexBuffer,
            Self::BindFragmentSampler { .. } => BackendOp::BindFragmentSampler,
            Self::SetViewport(..) => BackendOp::SetViewport,
            Self::SetScissor(..) => BackendOp::SetScissor,
            Self::SetStencilReference(..) => BackendOp::SetStencilReference,
            Self::DrawPrimitives { .. } => BackendOp::DrawPrimitives,
            Self::DrawIndexedPrimitives { .. } => BackendOp::DrawIndexedPrimitives,
            Self::BeginCopyPass { .. } => BackendOp::BeginCopyPass,
            Self::EndCopyPass(_) => BackendOp::EndCopyPass,
            Self::UploadToBuffer(..) => BackendOp::UploadToBuffer,
            Self::UploadToTexture(..) => BackendOp::UploadToTexture,
        }
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    next_handle: AtomicU64,
    calls: Mutex<Vec<BackendCall>>,
    pending_failures: Mutex<Vec<BackendOp>>,
    live_command_buffers: Mutex<HashSet<CommandBufferHandle>>,
    live_resources: Mutex<HashSet<NativeResource>>,
    swapchain_available: AtomicBool,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            pending_failures: Mutex::new(Vec::new()),
            live_command_buffers: Mutex::new(HashSet::new()),
            live_resources: Mutex::new(HashSet::new()),
            swapchain_available: AtomicBool::new(true),
        }
    }

    /// Make the next call of `op` fail with [`BackendError::CallFailed`].
    ///
    /// Only fallible operations can fail; injecting into an infallible one
    /// has no effect.
    pub fn fail_next(&self, op: BackendOp) {
        self.pending_failures.lock().push(op);
    }

    /// Control whether swapchain acquisition yields a texture.
    pub fn set_swapchain_available(&self, available: bool) {
        self.swapchain_available.store(available, Ordering::Relaxed);
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Operations of every call so far, in order.
    pub fn ops(&self) -> Vec<BackendOp> {
        self.calls.lock().iter().map(BackendCall::op).collect()
    }

    /// Number of calls of `op` so far.
    pub fn count(&self, op: BackendOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op() == op).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Command buffers acquired and neither submitted nor cancelled.
    pub fn live_command_buffers(&self) -> usize {
        self.live_command_buffers.lock().len()
    }

    /// Resources created and not released.
    pub fn live_resources(&self) -> usize {
        self.live_resources.lock().len()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    fn next_raw(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn check_failure(&self, op: BackendOp) -> Result<(), BackendError> {
        let mut pending = self.pending_failures.lock();
        match pending.iter().position(|&p| p == op) {
            Some(index) => {
                pending.remove(index);
                log::trace!("DummyBackend: injected {:?} failure", op);
                Err(BackendError::CallFailed(format!("injected {op:?} failure")))
            }
            None => Ok(()),
        }
    }

    fn create_resource<H>(
        &self,
        op: BackendOp,
        wrap: impl FnOnce(u64) -> Option<H>,
        native: impl FnOnce(H) -> NativeResource,
    ) -> Result<H, BackendError>
    where
        H: Copy,
    {
        self.check_failure(op)?;
        let handle = wrap(self.next_raw())
            .ok_or_else(|| BackendError::CallFailed("handle space exhausted".to_string()))?;
        let resource = native(handle);
        self.live_resources.lock().insert(resource);
        self.record(BackendCall::CreateResource(resource));
        Ok(handle)
    }

    fn finish_command_buffer(
        &self,
        op: BackendOp,
        command_buffer: CommandBufferHandle,
    ) -> Result<(), BackendError> {
        self.check_failure(op)?;
        if !self.live_command_buffers.lock().remove(&command_buffer) {
            return Err(BackendError::InvalidParameter(format!(
                "command buffer {} is not live",
                command_buffer.raw()
            )));
        }
        Ok(())
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_data_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        self.create_resource(
            BackendOp::CreateDataBuffer,
            BufferHandle::new,
            NativeResource::Buffer,
        )
    }

    fn create_transfer_buffer(
        &self,
        descriptor: &TransferBufferDescriptor,
    ) -> Result<TransferBufferHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating transfer buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        self.create_resource(
            BackendOp::CreateTransferBuffer,
            TransferBufferHandle::new,
            NativeResource::TransferBuffer,
        )
    }

    fn write_transfer_buffer(
        &self,
        buffer: TransferBufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        self.check_failure(BackendOp::WriteTransferBuffer)?;
        self.record(BackendCall::WriteTransferBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<TextureHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        self.create_resource(
            BackendOp::CreateTexture,
            TextureHandle::new,
            NativeResource::Texture,
        )
    }

    fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, BackendError> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        self.create_resource(
            BackendOp::CreateSampler,
            SamplerHandle::new,
            NativeResource::Sampler,
        )
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<PipelineHandle, BackendError> {
        log::trace!("DummyBackend: creating pipeline {:?}", descriptor.label);
        self.create_resource(
            BackendOp::CreateGraphicsPipeline,
            PipelineHandle::new,
            NativeResource::Pipeline,
        )
    }

    fn release_resource(&self, resource: NativeResource) {
        log::trace!("DummyBackend: releasing {:?}", resource);
        self.live_resources.lock().remove(&resource);
        self.record(BackendCall::ReleaseResource(resource));
    }

    fn acquire_command_buffer(&self) -> Result<CommandBufferHandle, BackendError> {
        self.check_failure(BackendOp::AcquireCommandBuffer)?;
        let handle = CommandBufferHandle::new(self.next_raw())
            .ok_or_else(|| BackendError::CallFailed("handle space exhausted".to_string()))?;
        self.live_command_buffers.lock().insert(handle);
        self.record(BackendCall::AcquireCommandBuffer(handle));
        log::trace!("DummyBackend: acquired command buffer {}", handle.raw());
        Ok(handle)
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferHandle,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::SubmitCommandBuffer(command_buffer));
        self.finish_command_buffer(BackendOp::SubmitCommandBuffer, command_buffer)?;
        log::trace!("DummyBackend: submitted command buffer {}", command_buffer.raw());
        Ok(())
    }

    fn cancel_command_buffer(
        &self,
        command_buffer: CommandBufferHandle,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::CancelCommandBuffer(command_buffer));
        self.finish_command_buffer(BackendOp::CancelCommandBuffer, command_buffer)?;
        log::trace!("DummyBackend: cancelled command buffer {}", command_buffer.raw());
        Ok(())
    }

    fn wait_and_acquire_swapchain_texture(
        &self,
        command_buffer: CommandBufferHandle,
        window: WindowId,
    ) -> Result<Option<SwapchainTexture>, BackendError> {
        self.record(BackendCall::AcquireSwapchainTexture {
            command_buffer,
            window,
        });
        self.check_failure(BackendOp::AcquireSwapchainTexture)?;

        if !self.swapchain_available.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let (width, height) = DUMMY_SWAPCHAIN_SIZE;
        Ok(TextureHandle::new(self.next_raw()).map(|handle| {
            SwapchainTexture::new(window, handle, width, height, TextureFormat::Bgra8Unorm)
        }))
    }

    fn push_vertex_uniform_data(&self, command_buffer: CommandBufferHandle, slot: u32, data: &[u8]) {
        self.record(BackendCall::PushVertexUniformData {
            command_buffer,
            slot,
            data: data.to_vec(),
        });
    }

    fn push_fragment_uniform_data(
        &self,
        command_buffer: CommandBufferHandle,
        slot: u32,
        data: &[u8],
    ) {
        self.record(BackendCall::PushFragmentUniformData {
            command_buffer,
            slot,
            data: data.to_vec(),
        });
    }

    fn begin_render_pass(
        &self,
        command_buffer: CommandBufferHandle,
        color_targets: &[ColorTargetInfo<'_>],
        depth_stencil: Option<&DepthStencilTargetInfo<'_>>,
    ) -> Result<RenderPassHandle, BackendError> {
        self.check_failure(BackendOp::BeginRenderPass)?;
        let pass = RenderPassHandle::new(self.next_raw())
            .ok_or_else(|| BackendError::CallFailed("handle space exhausted".to_string()))?;
        self.record(BackendCall::BeginRenderPass {
            command_buffer,
            pass,
            color_targets: color_targets.len(),
            depth_stencil: depth_stencil.is_some(),
        });
        Ok(pass)
    }

    fn end_render_pass(&self, pass: RenderPassHandle) {
        self.record(BackendCall::EndRenderPass(pass));
    }

    fn bind_graphics_pipeline(&self, pass: RenderPassHandle, pipeline: PipelineHandle) {
        self.record(BackendCall::BindGraphicsPipeline { pass, pipeline });
    }

    fn bind_vertex_buffer(&self, pass: RenderPassHandle, slot: u32, buffer: BufferHandle, offset: u64) {
        self.record(BackendCall::BindVertexBuffer {
            pass,
            slot,
            buffer,
            offset,
        });
    }

    fn bind_index_buffer(
        &self,
        pass: RenderPassHandle,
        buffer: BufferHandle,
        offset: u64,
        element_size: IndexElementSize,
    ) {
        self.record(BackendCall::BindIndexBuffer {
            pass,
            buffer,
            offset,
            element_size,
        });
    }

    fn bind_fragment_sampler(
        &self,
        pass: RenderPassHandle,
        slot: u32,
        texture: TextureHandle,
        sampler: SamplerHandle,
    ) {
        self.record(BackendCall::BindFragmentSampler {
            pass,
            slot,
            texture,
            sampler,
        });
    }

    fn set_viewport(&self, pass: RenderPassHandle, viewport: &Viewport) {
        self.record(BackendCall::SetViewport(pass, *viewport));
    }

    fn set_scissor(&self, pass: RenderPassHandle, scissor: &ScissorRect) {
        self.record(BackendCall::SetScissor(pass, *scissor));
    }

    fn set_stencil_reference(&self, pass: RenderPassHandle, reference: u8) {
        self.record(BackendCall::SetStencilReference(pass, reference));
    }

    fn draw_primitives(
        &self,
        pass: RenderPassHandle,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.record(BackendCall::DrawPrimitives {
            pass,
            vertex_count,
            instance_count,
        });
    }

    fn draw_indexed_primitives(
        &self,
        pass: RenderPassHandle,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.record(BackendCall::DrawIndexedPrimitives {
            pass,
            index_count,
            instance_count,
        });
    }

    fn begin_copy_pass(
        &self,
        command_buffer: CommandBufferHandle,
    ) -> Result<CopyPassHandle, BackendError> {
        self.check_failure(BackendOp::BeginCopyPass)?;
        let pass = CopyPassHandle::new(self.next_raw())
            .ok_or_else(|| BackendError::CallFailed("handle space exhausted".to_string()))?;
        self.record(BackendCall::BeginCopyPass {
            command_buffer,
            pass,
        });
        Ok(pass)
    }

    fn end_copy_pass(&self, pass: CopyPassHandle) {
        self.record(BackendCall::EndCopyPass(pass));
    }

    fn upload_to_buffer(&self, pass: CopyPassHandle, upload: &BufferUpload) {
        self.record(BackendCall::UploadToBuffer(pass, *upload));
    }

    fn upload_to_texture(&self, pass: CopyPassHandle, upload: &TextureUpload) {
        self.record(BackendCall::UploadToTexture(pass, *upload));
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);
