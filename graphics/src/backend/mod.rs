//! GPU backend abstraction layer.
//!
//! The command-recording layer never talks to a driver directly. Every native
//! call goes through the [`GpuBackend`] trait, which hands out opaque handles
//! and reports failures as [`BackendError`]s.
//!
//! # Available Backends
//!
//! - `dummy` (default feature): records calls without touching a GPU. Used
//!   by tests and the demos.
//!
//! Real drivers implement the same trait outside this crate.

mod error;

#[cfg(feature = "dummy")]
pub mod dummy;

#[cfg(feature = "dummy")]
pub use dummy::{BackendCall, BackendOp, DummyBackend};
pub use error::BackendError;

use std::num::NonZeroU64;

use crate::resources::SwapchainTexture;
use crate::types::{
    BufferDescriptor, ColorTargetInfo, DepthStencilTargetInfo, GraphicsPipelineDescriptor,
    IndexElementSize, SamplerDescriptor, ScissorRect, TextureDescriptor, TextureRegion,
    TransferBufferDescriptor, Viewport, WindowId,
};

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Wrap a raw native handle. Returns `None` for null.
            pub fn new(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map(Self)
            }

            /// The raw native handle.
            pub fn raw(self) -> u64 {
                self.0.get()
            }
        }
    };
}

native_handle!(
    /// Native command buffer.
    CommandBufferHandle
);
native_handle!(
    /// Native render pass.
    RenderPassHandle
);
native_handle!(
    /// Native copy pass.
    CopyPassHandle
);
native_handle!(
    /// Native data buffer.
    BufferHandle
);
native_handle!(
    /// Native transfer buffer.
    TransferBufferHandle
);
native_handle!(
    /// Native texture.
    TextureHandle
);
native_handle!(
    /// Native sampler.
    SamplerHandle
);
native_handle!(
    /// Native graphics pipeline.
    PipelineHandle
);

/// A native resource to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeResource {
    /// A data buffer.
    Buffer(BufferHandle),
    /// A transfer buffer.
    TransferBuffer(TransferBufferHandle),
    /// A texture.
    Texture(TextureHandle),
    /// A sampler.
    Sampler(SamplerHandle),
    /// A graphics pipeline.
    Pipeline(PipelineHandle),
}

/// A copy from a transfer buffer into a data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferUpload {
    /// Source transfer buffer.
    pub source: TransferBufferHandle,
    /// Byte offset into the source.
    pub source_offset: u64,
    /// Destination data buffer.
    pub destination: BufferHandle,
    /// Byte offset into the destination.
    pub destination_offset: u64,
    /// Number of bytes.
    pub size: u64,
    /// Let the driver cycle the destination if it is still in use.
    pub cycle: bool,
}

/// A copy from a transfer buffer into a texture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUpload {
    /// Source transfer buffer.
    pub source: TransferBufferHandle,
    /// Byte offset into the source.
    pub source_offset: u64,
    /// Destination texture.
    pub destination: TextureHandle,
    /// Destination region.
    pub region: TextureRegion,
    /// Let the driver cycle the destination if it is still in use.
    pub cycle: bool,
}

/// Native graphics API as seen by the command-recording layer.
///
/// Fallible calls return [`BackendError`]; the caller logs and wraps them.
/// Calls the driver treats as infallible (binds, draws, pass ends) return
/// nothing. Implementations must be callable from any thread.
pub trait GpuBackend: Send + Sync + 'static {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    // --- resources ---------------------------------------------------------

    /// Create a data buffer.
    fn create_data_buffer(&self, descriptor: &BufferDescriptor)
    -> Result<BufferHandle, BackendError>;

    /// Create a transfer buffer.
    fn create_transfer_buffer(
        &self,
        descriptor: &TransferBufferDescriptor,
    ) -> Result<TransferBufferHandle, BackendError>;

    /// Copy `data` into a transfer buffer at `offset`.
    fn write_transfer_buffer(
        &self,
        buffer: TransferBufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Create a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor)
    -> Result<TextureHandle, BackendError>;

    /// Create a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor)
    -> Result<SamplerHandle, BackendError>;

    /// Create a graphics pipeline.
    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<PipelineHandle, BackendError>;

    /// Release a resource created by this backend.
    fn release_resource(&self, resource: NativeResource);

    // --- command buffers ---------------------------------------------------

    /// Acquire a fresh command buffer.
    fn acquire_command_buffer(&self) -> Result<CommandBufferHandle, BackendError>;

    /// Submit a command buffer. The handle is invalid afterwards.
    fn submit_command_buffer(&self, command_buffer: CommandBufferHandle)
    -> Result<(), BackendError>;

    /// Discard a command buffer. The handle is invalid afterwards on success.
    fn cancel_command_buffer(&self, command_buffer: CommandBufferHandle)
    -> Result<(), BackendError>;

    /// Block until a swapchain texture of `window` is available and acquire
    /// it. `Ok(None)` means none is available right now (e.g. the window is
    /// minimized).
    fn wait_and_acquire_swapchain_texture(
        &self,
        command_buffer: CommandBufferHandle,
        window: WindowId,
    ) -> Result<Option<SwapchainTexture>, BackendError>;

    /// Push uniform data to a vertex stage slot for subsequent draws.
    fn push_vertex_uniform_data(&self, command_buffer: CommandBufferHandle, slot: u32, data: &[u8]);

    /// Push uniform data to a fragment stage slot for subsequent draws.
    fn push_fragment_uniform_data(
        &self,
        command_buffer: CommandBufferHandle,
        slot: u32,
        data: &[u8],
    );

    // --- render passes -----------------------------------------------------

    /// Begin a render pass.
    fn begin_render_pass(
        &self,
        command_buffer: CommandBufferHandle,
        color_targets: &[ColorTargetInfo<'_>],
        depth_stencil: Option<&DepthStencilTargetInfo<'_>>,
    ) -> Result<RenderPassHandle, BackendError>;

    /// End a render pass.
    fn end_render_pass(&self, pass: RenderPassHandle);

    /// Bind a graphics pipeline.
    fn bind_graphics_pipeline(&self, pass: RenderPassHandle, pipeline: PipelineHandle);

    /// Bind a vertex buffer to `slot`.
    fn bind_vertex_buffer(&self, pass: RenderPassHandle, slot: u32, buffer: BufferHandle, offset: u64);

    /// Bind the index buffer.
    fn bind_index_buffer(
        &self,
        pass: RenderPassHandle,
        buffer: BufferHandle,
        offset: u64,
        element_size: IndexElementSize,
    );

    /// Bind a texture and sampler to a fragment sampler slot.
    fn bind_fragment_sampler(
        &self,
        pass: RenderPassHandle,
        slot: u32,
        texture: TextureHandle,
        sampler: SamplerHandle,
    );

    /// Set the viewport.
    fn set_viewport(&self, pass: RenderPassHandle, viewport: &Viewport);

    /// Set the scissor rectangle.
    fn set_scissor(&self, pass: RenderPassHandle, scissor: &ScissorRect);

    /// Set the stencil reference value.
    fn set_stencil_reference(&self, pass: RenderPassHandle, reference: u8);

    /// Draw non-indexed primitives.
    fn draw_primitives(
        &self,
        pass: RenderPassHandle,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    /// Draw indexed primitives.
    fn draw_indexed_primitives(
        &self,
        pass: RenderPassHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    // --- copy passes -------------------------------------------------------

    /// Begin a copy pass.
    fn begin_copy_pass(&self, command_buffer: CommandBufferHandle)
    -> Result<CopyPassHandle, BackendError>;

    /// End a copy pass.
    fn end_copy_pass(&self, pass: CopyPassHandle);

    /// Record a transfer-buffer-to-buffer copy.
    fn upload_to_buffer(&self, pass: CopyPassHandle, upload: &BufferUpload);

    /// Record a transfer-buffer-to-texture copy.
    fn upload_to_texture(&self, pass: CopyPassHandle, upload: &TextureUpload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle_is_none() {
        assert!(CommandBufferHandle::new(0).is_none());
        assert_eq!(CommandBufferHandle::new(7).map(|h| h.raw()), Some(7));
    }
}
