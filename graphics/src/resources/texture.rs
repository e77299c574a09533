//! GPU texture resources.

use std::sync::Arc;

use crate::backend::{GpuBackend, NativeResource, TextureHandle};
use crate::types::{
    Extent3d, SampleCount, TextureDescriptor, TextureFormat, TextureUsage, WindowId,
};

/// A texture owned by the caller.
///
/// Created by [`Device::create_texture`]. The native texture is released
/// when the last `Arc` is dropped, so a texture must outlive any command
/// buffer that still references it.
///
/// [`Device::create_texture`]: crate::Device::create_texture
pub struct Texture {
    backend: Arc<dyn GpuBackend>,
    handle: TextureHandle,
    descriptor: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        handle: TextureHandle,
        descriptor: TextureDescriptor,
    ) -> Self {
        Self {
            backend,
            handle,
            descriptor,
        }
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Size of mip level 0. `depth` is the layer count.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }

    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    pub fn sample_count(&self) -> SampleCount {
        self.descriptor.sample_count
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.backend
            .release_resource(NativeResource::Texture(self.handle));
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("mips", &self.descriptor.mip_level_count)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// A swapchain texture acquired for one frame.
///
/// Owned by the swapchain, not by the caller: it is only valid until the
/// command buffer that acquired it is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainTexture {
    window: WindowId,
    handle: TextureHandle,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl SwapchainTexture {
    /// Describe a swapchain texture handed out by a backend.
    pub fn new(
        window: WindowId,
        handle: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Self {
        Self {
            window,
            handle,
            width,
            height,
            format,
        }
    }

    /// The window this texture is presented to.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Get the native handle.
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Swapchain format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
