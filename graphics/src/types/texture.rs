//! Texture types and descriptors.

use super::Extent3d;
use bitflags::bitflags;

/// Texel formats the command layer can size uploads for and validate
/// render targets against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth16Unorm,
    Depth24PlusStencil8,
    Depth32Float,
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Whether textures of this format can only be depth/stencil targets.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Whether the format carries a stencil aspect.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Bytes one texel occupies in a tightly packed upload.
    pub fn bytes_per_texel(self) -> u32 {
        use TextureFormat::*;
        match self {
            R8Unorm => 1,
            Rg8Unorm | Depth16Unorm => 2,
            Rgba8Unorm | Rgba8UnormSrgb | Bgra8Unorm | Bgra8UnormSrgb | Depth24PlusStencil8
            | Depth32Float => 4,
            Rgba16Float | Depth32FloatStencil8 => 8,
            Rgba32Float => 16,
        }
    }
}

/// Multisample count of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

impl SampleCount {
    /// Samples per texel.
    pub fn get(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

bitflags! {
    /// How a texture may be used by a command buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const SAMPLER = 1 << 0;
        const COLOR_TARGET = 1 << 1;
        const DEPTH_STENCIL_TARGET = 1 << 2;
        const GRAPHICS_STORAGE_READ = 1 << 3;
        const COMPUTE_STORAGE_READ = 1 << 4;
        const COMPUTE_STORAGE_WRITE = 1 << 5;
    }
}

/// Descriptor for creating a texture.
///
/// `size.depth` is the layer count of a 2D texture array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub sample_count: SampleCount,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Single-layer 2D texture with one mip level.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            size: Extent3d::new_2d(width, height),
            format,
            usage,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Check the descriptor before it reaches the backend.
    pub fn validate(&self) -> Result<(), String> {
        let Extent3d {
            width,
            height,
            depth,
        } = self.size;
        if width == 0 || height == 0 || depth == 0 {
            return Err(format!("texture size {width}x{height}x{depth} has a zero dimension"));
        }
        if self.mip_level_count == 0 {
            return Err("texture needs at least one mip level".to_string());
        }
        let max_mips = 32 - width.max(height).leading_zeros();
        if self.mip_level_count > max_mips {
            return Err(format!(
                "{} mip levels requested, {width}x{height} supports {max_mips}",
                self.mip_level_count
            ));
        }
        if self.sample_count != SampleCount::X1 && self.mip_level_count > 1 {
            return Err("multisampled textures cannot have mip levels".to_string());
        }
        if self.usage.is_empty() {
            return Err("texture has no usage".to_string());
        }
        Ok(())
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent3d::default(),
            mip_level_count: 1,
            sample_count: SampleCount::X1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth24PlusStencil8.is_depth());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(!TextureFormat::Bgra8Unorm.is_depth());
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(TextureFormat::Rg8Unorm.bytes_per_texel(), 2);
        assert_eq!(TextureFormat::Bgra8UnormSrgb.bytes_per_texel(), 4);
        assert_eq!(TextureFormat::Rgba32Float.bytes_per_texel(), 16);
    }

    #[test]
    fn test_validate_mip_chain() {
        let desc = TextureDescriptor::new_2d(256, 64, TextureFormat::R8Unorm, TextureUsage::SAMPLER);
        assert!(desc.clone().with_mip_levels(9).validate().is_ok());
        assert!(desc.clone().with_mip_levels(10).validate().is_err());
        assert!(desc.with_mip_levels(0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_multisampled_mips() {
        let desc = TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm, TextureUsage::COLOR_TARGET)
            .with_sample_count(SampleCount::X4);
        assert!(desc.validate().is_ok());
        assert!(desc.with_mip_levels(2).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_texture() {
        let desc = TextureDescriptor::new_2d(0, 64, TextureFormat::Rgba8Unorm, TextureUsage::SAMPLER);
        assert!(desc.validate().is_err());
        assert!(TextureDescriptor::default().validate().is_err());
    }
}
