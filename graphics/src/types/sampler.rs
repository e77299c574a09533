//! Sampler types and descriptors.

/// Texel filter used for magnification and minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// How samples between two mip levels are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipmapMode {
    #[default]
    Nearest,
    Linear,
}

/// Behavior for texture coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Comparison applied by depth-compare samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Descriptor for creating a sampler.
///
/// One filter and one address mode apply to every axis, which is all the
/// renderers built on this crate need.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub filter: FilterMode,
    pub mipmap_mode: MipmapMode,
    pub address_mode: AddressMode,
    /// Lowest and highest mip level the sampler may pick.
    pub lod_range: (f32, f32),
    pub compare: Option<CompareOp>,
    /// `None` disables anisotropic filtering.
    pub max_anisotropy: Option<f32>,
}

impl SamplerDescriptor {
    /// Trilinear sampler.
    pub fn linear() -> Self {
        Self {
            filter: FilterMode::Linear,
            mipmap_mode: MipmapMode::Linear,
            ..Default::default()
        }
    }

    /// Point sampler for pixel-exact lookups.
    pub fn nearest() -> Self {
        Self {
            address_mode: AddressMode::ClampToEdge,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    pub fn with_lod_range(mut self, min: f32, max: f32) -> Self {
        self.lod_range = (min, max);
        self
    }

    /// Turn this into a depth-compare sampler (shadow maps).
    pub fn with_compare(mut self, compare: CompareOp) -> Self {
        self.compare = Some(compare);
        self
    }

    pub fn with_anisotropy(mut self, max_anisotropy: f32) -> Self {
        self.max_anisotropy = Some(max_anisotropy);
        self
    }

    /// Check the descriptor before it reaches the backend.
    pub fn validate(&self) -> Result<(), String> {
        let (min, max) = self.lod_range;
        if min.is_nan() || max.is_nan() || min < 0.0 || min > max {
            return Err(format!("invalid sampler lod range {min}..{max}"));
        }
        if let Some(anisotropy) = self.max_anisotropy {
            if !(1.0..=16.0).contains(&anisotropy) {
                return Err(format!("max anisotropy {anisotropy} is outside 1..=16"));
            }
            if self.filter != FilterMode::Linear {
                return Err("anisotropic filtering requires linear filtering".to_string());
            }
        }
        Ok(())
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            filter: FilterMode::Nearest,
            mipmap_mode: MipmapMode::Nearest,
            address_mode: AddressMode::Repeat,
            lod_range: (0.0, f32::MAX),
            compare: None,
            max_anisotropy: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(SamplerDescriptor::default().validate().is_ok());
        assert!(SamplerDescriptor::nearest().validate().is_ok());
        assert!(SamplerDescriptor::linear().with_anisotropy(8.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_lod_range() {
        let desc = SamplerDescriptor::linear().with_lod_range(4.0, 2.0);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_anisotropy_needs_linear_filter() {
        let desc = SamplerDescriptor::nearest().with_anisotropy(4.0);
        assert!(desc.validate().is_err());
        assert!(SamplerDescriptor::linear().with_anisotropy(32.0).validate().is_err());
    }
}
