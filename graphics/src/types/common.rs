//! Common types shared across the graphics system.

use bytemuck::{Pod, Zeroable};

// ============================================================================
// Viewport
// ============================================================================

/// Viewport configuration for rendering.
///
/// Defines the rectangular region of the render target that will be drawn to,
/// along with the depth range mapping. Depth uses the `[0, 1]` convention and
/// the origin is the top-left corner.
///
/// # Example
///
/// ```
/// use lilium_gpu::Viewport;
///
/// let viewport = Viewport::new(0.0, 0.0, 1920.0, 1080.0).with_depth_range(0.0, 0.5);
/// assert_eq!(viewport.max_depth, 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X coordinate of the viewport's top-left corner.
    pub x: f32,
    /// Y coordinate of the viewport's top-left corner.
    pub y: f32,
    /// Width of the viewport.
    pub width: f32,
    /// Height of the viewport.
    pub height: f32,
    /// Minimum depth value (default: 0.0).
    pub min_depth: f32,
    /// Maximum depth value (default: 1.0).
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Viewport {
    /// Create a new viewport with standard `[0, 1]` depth range.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Create a viewport from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Set the depth range.
    ///
    /// `min > max` (reverse-Z) is allowed.
    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

// ============================================================================
// Scissor Rectangle
// ============================================================================

/// Scissor rectangle for clipping rendering.
///
/// Pixels outside the scissor rectangle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width of the scissor rectangle.
    pub width: u32,
    /// Height of the scissor rectangle.
    pub height: u32,
}

impl ScissorRect {
    /// Create a new scissor rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a scissor rectangle from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

// ============================================================================
// Extent3d
// ============================================================================

/// 3D extent for textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layer count of a texture array (1 for a plain 2D texture).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Size of the given mip level. Never smaller than one texel per axis.
    ///
    /// Only width and height shrink; every mip level has all the layers.
    pub fn mip_level_size(&self, mip_level: u32) -> Self {
        let shrink = |v: u32| v.checked_shr(mip_level).unwrap_or(0).max(1);
        Self {
            width: shrink(self.width),
            height: shrink(self.height),
            depth: self.depth,
        }
    }
}

// ============================================================================
// Color
// ============================================================================

/// Linear RGBA color with 32-bit float channels.
///
/// Laid out exactly like a `vec4` uniform so it can be pushed to a shader
/// as-is.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Cornflower blue, the classic clear color.
    pub const CORNFLOWER_BLUE: Self = Self::new(0.392, 0.584, 0.929, 1.0);

    /// Create a color from its channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

// ============================================================================
// Texture Region
// ============================================================================

/// A rectangle inside one mip level of a texture, spanning one or more
/// array layers.
///
/// Textures are 2D or 2D arrays, so there is no z axis: `layer` and
/// `layer_count` pick the slices of the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureRegion {
    /// Mip level.
    pub mip_level: u32,
    /// First array layer.
    pub layer: u32,
    /// Number of array layers.
    pub layer_count: u32,
    /// X offset in texels.
    pub x: u32,
    /// Y offset in texels.
    pub y: u32,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl TextureRegion {
    /// Region covering a whole 2D mip level 0 of the given size.
    pub fn whole_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layer_count: 1,
            ..Default::default()
        }
    }

    /// Number of texels in the region, or `None` if it does not fit a `u64`.
    pub fn texel_count(&self) -> Option<u64> {
        u64::from(self.width)
            .checked_mul(u64::from(self.height))?
            .checked_mul(u64::from(self.layer_count))
    }
}

// ============================================================================
// Window
// ============================================================================

/// Opaque identifier of a window owned by the windowing layer.
///
/// The graphics layer never creates windows; it only hands these ids to the
/// backend when acquiring swapchain textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);
