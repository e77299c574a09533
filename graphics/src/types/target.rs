//! Render target types for render passes.
//!
//! This module defines the types used to describe the color and depth/stencil
//! targets a render pass draws into.

use crate::error::GpuError;
use crate::resources::{SwapchainTexture, Texture};

use super::{Color, SampleCount, TextureFormat, TextureUsage};
use crate::backend::TextureHandle;

/// Operation to perform when loading a target at the start of a render pass.
///
/// `V` is the clear value: a [`Color`] for color targets, the depth value for
/// depth targets, the stencil value for stencil targets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp<V> {
    /// Load the existing contents of the target.
    #[default]
    Load,
    /// Clear the target with the given value.
    Clear(V),
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

/// Operation to perform when storing a target at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the target contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
    /// Resolve the multisampled contents into the resolve target and discard
    /// the samples.
    Resolve,
    /// Resolve into the resolve target and keep the samples too.
    ResolveAndStore,
}

impl StoreOp {
    /// Returns true if this operation writes a resolve target.
    pub fn resolves(self) -> bool {
        matches!(self, Self::Resolve | Self::ResolveAndStore)
    }
}

/// A texture that can be rendered to.
#[derive(Debug, Clone, Copy)]
pub enum RenderTarget<'a> {
    /// An engine-created texture.
    Texture(&'a Texture),
    /// A swapchain texture acquired for this frame.
    Swapchain(&'a SwapchainTexture),
}

impl RenderTarget<'_> {
    /// Native handle of the target texture.
    pub fn handle(&self) -> TextureHandle {
        match self {
            Self::Texture(texture) => texture.handle(),
            Self::Swapchain(texture) => texture.handle(),
        }
    }

    /// Format of the target texture.
    pub fn format(&self) -> TextureFormat {
        match self {
            Self::Texture(texture) => texture.format(),
            Self::Swapchain(texture) => texture.format(),
        }
    }

    fn sample_count(&self) -> SampleCount {
        match self {
            Self::Texture(texture) => texture.sample_count(),
            Self::Swapchain(_) => SampleCount::X1,
        }
    }

    fn validate(&self, usage: TextureUsage, mip_level: u32, what: &str) -> Result<(), GpuError> {
        let Self::Texture(texture) = self else {
            return Ok(());
        };

        if !texture.usage().contains(usage) {
            return Err(GpuError::InvalidParameter(format!(
                "{what} texture {:?} lacks {usage:?} usage",
                texture.label()
            )));
        }
        if mip_level >= texture.mip_level_count() {
            return Err(GpuError::InvalidParameter(format!(
                "{what} mip level {mip_level} out of range ({} levels)",
                texture.mip_level_count()
            )));
        }
        Ok(())
    }
}

impl<'a> From<&'a Texture> for RenderTarget<'a> {
    fn from(texture: &'a Texture) -> Self {
        Self::Texture(texture)
    }
}

impl<'a> From<&'a SwapchainTexture> for RenderTarget<'a> {
    fn from(texture: &'a SwapchainTexture) -> Self {
        Self::Swapchain(texture)
    }
}

/// A color target of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct ColorTargetInfo<'a> {
    /// The texture to render to.
    pub target: RenderTarget<'a>,
    /// Mip level to render to.
    pub mip_level: u32,
    /// Array layer or depth plane to render to.
    pub layer_or_depth_plane: u32,
    /// Operation when loading the target.
    pub load_op: LoadOp<Color>,
    /// Operation when storing the target.
    pub store_op: StoreOp,
    /// Resolve target for multisampled rendering.
    pub resolve_target: Option<RenderTarget<'a>>,
    /// Let the driver cycle the texture if it is still in use by the GPU.
    pub cycle: bool,
}

impl<'a> ColorTargetInfo<'a> {
    /// Create a color target that loads and stores `target`.
    pub fn new(target: impl Into<RenderTarget<'a>>) -> Self {
        Self {
            target: target.into(),
            mip_level: 0,
            layer_or_depth_plane: 0,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            resolve_target: None,
            cycle: false,
        }
    }

    /// Clear the target to `color` at the start of the pass.
    pub fn with_clear(mut self, color: Color) -> Self {
        self.load_op = LoadOp::Clear(color);
        self
    }

    /// Set the load operation.
    pub fn with_load_op(mut self, load_op: LoadOp<Color>) -> Self {
        self.load_op = load_op;
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Resolve the multisampled target into `resolve_target`.
    pub fn with_resolve(mut self, resolve_target: impl Into<RenderTarget<'a>>) -> Self {
        self.resolve_target = Some(resolve_target.into());
        self.store_op = StoreOp::Resolve;
        self
    }

    /// Let the driver cycle the texture.
    pub fn with_cycle(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GpuError> {
        self.target
            .validate(TextureUsage::COLOR_TARGET, self.mip_level, "color target")?;

        match (self.store_op.resolves(), &self.resolve_target) {
            (true, None) => Err(GpuError::InvalidParameter(format!(
                "store op {:?} requires a resolve target",
                self.store_op
            ))),
            (false, Some(_)) => Err(GpuError::InvalidParameter(
                "resolve target given but the store op does not resolve".to_string(),
            )),
            (true, Some(resolve)) => {
                resolve.validate(TextureUsage::COLOR_TARGET, 0, "resolve target")?;
                if self.target.sample_count() == SampleCount::X1 {
                    return Err(GpuError::InvalidParameter(
                        "only multisampled targets can be resolved".to_string(),
                    ));
                }
                if resolve.sample_count() != SampleCount::X1 {
                    return Err(GpuError::InvalidParameter(
                        "resolve target must not be multisampled".to_string(),
                    ));
                }
                Ok(())
            }
            (false, None) => Ok(()),
        }
    }
}

/// The depth/stencil target of a render pass.
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilTargetInfo<'a> {
    /// The depth/stencil texture.
    pub texture: &'a Texture,
    /// Operation when loading the depth values.
    pub load_op: LoadOp<f32>,
    /// Operation when storing the depth values.
    pub store_op: StoreOp,
    /// Operation when loading the stencil values.
    pub stencil_load_op: LoadOp<u8>,
    /// Operation when storing the stencil values.
    pub stencil_store_op: StoreOp,
    /// Let the driver cycle the texture if it is still in use by the GPU.
    pub cycle: bool,
}

impl<'a> DepthStencilTargetInfo<'a> {
    /// Create a depth/stencil target that clears depth to `depth` and stencil
    /// to zero.
    pub fn new(texture: &'a Texture, depth: f32) -> Self {
        Self {
            texture,
            load_op: LoadOp::Clear(depth),
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::Clear(0),
            stencil_store_op: StoreOp::DontCare,
            cycle: true,
        }
    }

    /// Set the stencil load and store operations.
    pub fn with_stencil(mut self, load_op: LoadOp<u8>, store_op: StoreOp) -> Self {
        self.stencil_load_op = load_op;
        self.stencil_store_op = store_op;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GpuError> {
        RenderTarget::Texture(self.texture).validate(
            TextureUsage::DEPTH_STENCIL_TARGET,
            0,
            "depth-stencil target",
        )?;

        if !self.texture.format().is_depth() {
            return Err(GpuError::InvalidParameter(format!(
                "depth-stencil target has color format {:?}",
                self.texture.format()
            )));
        }
        if self.store_op.resolves() || self.stencil_store_op.resolves() {
            return Err(GpuError::InvalidParameter(
                "depth-stencil targets cannot be resolved".to_string(),
            ));
        }
        Ok(())
    }
}
