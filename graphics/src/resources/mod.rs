//! GPU resources.
//!
//! This module contains the GPU resource types that are created by [`Device`]:
//! - [`DataBuffer`] - vertex, index and storage memory
//! - [`TransferBuffer`] - CPU-visible staging memory for copy passes
//! - [`Texture`] - GPU texture/image
//! - [`Sampler`] - Texture sampler
//! - [`GraphicsPipeline`] - Compiled graphics pipeline
//!
//! Resources are reference-counted with [`Arc`] and can be shared across
//! threads. Each one releases its native object when dropped.
//! [`SwapchainTexture`] is the exception: it is borrowed from the swapchain
//! for a single frame.
//!
//! [`Device`]: crate::Device
//! [`Arc`]: std::sync::Arc

mod buffer;
mod pipeline;
mod sampler;
mod texture;

pub use buffer::{DataBuffer, TransferBuffer};
pub use pipeline::GraphicsPipeline;
pub use sampler::Sampler;
pub use texture::{SwapchainTexture, Texture};
