//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, render target infos and
//! descriptor structs used throughout the graphics system.

mod buffer;
mod common;
mod pipeline;
mod sampler;
mod target;
mod texture;

pub use buffer::{
    BufferDescriptor, BufferUsage, IndexElementSize, TransferBufferDescriptor,
    TransferBufferUsage,
};
pub use common::{Color, Extent3d, ScissorRect, TextureRegion, Viewport, WindowId};
pub use pipeline::{
    CullMode, FillMode, GraphicsPipelineDescriptor, PrimitiveType, ShaderCode,
};
pub use sampler::{AddressMode, CompareOp, FilterMode, MipmapMode, SamplerDescriptor};
pub use target::{ColorTargetInfo, DepthStencilTargetInfo, LoadOp, RenderTarget, StoreOp};
pub use texture::{SampleCount, TextureDescriptor, TextureFormat, TextureUsage};
