//! # Lilium GPU
//!
//! Command recording for the Lilium engine on top of an abstract GPU backend.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Device`] - Owns the command buffer and render pass pools, creates resources
//! - [`CommandBuffer`] - Pooled unit of GPU work, ended by submit or cancel
//! - [`RenderPass`] / [`CopyPass`] - Recording scopes borrowed from a command buffer
//! - [`GpuBackend`] - Trait for native driver implementations
//! - [`DummyBackend`] - Backend without a GPU, for tests and demos
//!
//! Command buffers and render pass states are leased from
//! [`lilium_core::pool`] pools and go back there when a command buffer is
//! submitted or cancelled. A command buffer that is dropped instead is
//! reported as a leak.
//!
//! ## Example
//!
//! ```
//! use lilium_gpu::{Color, ColorTargetInfo, Device, WindowId};
//!
//! let device = Device::with_dummy_backend();
//!
//! let mut cmd = device.acquire_command_buffer()?;
//! if let Some(swapchain) = cmd.acquire_swapchain_texture(WindowId(1))? {
//!     let target = ColorTargetInfo::new(&swapchain).with_clear(Color::BLACK);
//!     let pass = cmd.begin_render_pass(None, &[target])?;
//!     pass.end();
//! }
//! cmd.submit();
//! # Ok::<(), lilium_gpu::GpuError>(())
//! ```

pub mod backend;
mod command_buffer;
mod copy_pass;
mod device;
mod error;
mod render_pass;
pub mod resources;
pub mod types;

// Re-export main types for convenience
#[cfg(feature = "dummy")]
pub use backend::{BackendCall, BackendOp, DummyBackend};
pub use backend::{BackendError, GpuBackend};
pub use command_buffer::CommandBuffer;
pub use copy_pass::CopyPass;
pub use device::{COMMAND_BUFFER_POOL_NAME, Device, DeviceDescriptor, RENDER_PASS_POOL_NAME};
pub use error::{CancelError, GpuError, NATIVE_LOG_TARGET};
pub use render_pass::RenderPass;
pub use resources::{DataBuffer, GraphicsPipeline, Sampler, SwapchainTexture, Texture, TransferBuffer};
pub use types::{
    BufferDescriptor, BufferUsage, Color, ColorTargetInfo, DepthStencilTargetInfo, Extent3d,
    GraphicsPipelineDescriptor, IndexElementSize, LoadOp, SamplerDescriptor, ScissorRect,
    ShaderCode, StoreOp, TextureDescriptor, TextureFormat, TextureRegion, TextureUsage,
    TransferBufferDescriptor, TransferBufferUsage, Viewport, WindowId,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
pub fn init() {
    lilium_core::init();
    log::info!("Lilium GPU v{} initialized", VERSION);
}
