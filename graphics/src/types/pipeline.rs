//! Graphics pipeline descriptors.
//!
//! Shaders are produced by an external toolchain and arrive as opaque
//! bytecode; this layer only forwards them to the backend.

use super::TextureFormat;

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Each vertex after the first two forms a triangle with the previous two.
    TriangleStrip,
    /// Every two vertices form a line.
    LineList,
    /// Each vertex after the first forms a line with the previous one.
    LineStrip,
    /// Every vertex is a point.
    PointList,
}

/// Which triangle faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    #[default]
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    Back,
}

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Fill the triangle.
    #[default]
    Fill,
    /// Draw triangle edges only.
    Line,
}

/// Compiled shader bytecode for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderCode {
    /// Backend-specific bytecode.
    pub bytecode: Vec<u8>,
    /// Entry point name.
    pub entry_point: String,
    /// Number of uniform buffer slots the stage reads.
    pub uniform_buffer_count: u32,
    /// Number of sampler slots the stage reads.
    pub sampler_count: u32,
}

impl ShaderCode {
    /// Create shader code with the `main` entry point.
    pub fn new(bytecode: impl Into<Vec<u8>>) -> Self {
        Self {
            bytecode: bytecode.into(),
            entry_point: "main".to_string(),
            ..Default::default()
        }
    }

    /// Set the number of uniform buffer slots.
    pub fn with_uniform_buffers(mut self, count: u32) -> Self {
        self.uniform_buffer_count = count;
        self
    }

    /// Set the number of sampler slots.
    pub fn with_samplers(mut self, count: u32) -> Self {
        self.sampler_count = count;
        self
    }
}

/// Descriptor for creating a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GraphicsPipelineDescriptor {
    /// Debug label for the pipeline.
    pub label: Option<String>,
    /// Vertex stage.
    pub vertex_shader: ShaderCode,
    /// Fragment stage.
    pub fragment_shader: ShaderCode,
    /// Stride in bytes of each bound vertex buffer, by slot.
    pub vertex_buffer_pitches: Vec<u32>,
    /// Primitive topology.
    pub primitive_type: PrimitiveType,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Rasterization fill mode.
    pub fill_mode: FillMode,
    /// Formats of the color targets the pipeline renders to.
    pub color_target_formats: Vec<TextureFormat>,
    /// Format of the depth/stencil target, if any.
    pub depth_stencil_format: Option<TextureFormat>,
}

impl GraphicsPipelineDescriptor {
    /// Create a descriptor rendering to a single color target.
    pub fn new(
        vertex_shader: ShaderCode,
        fragment_shader: ShaderCode,
        color_format: TextureFormat,
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            color_target_formats: vec![color_format],
            ..Default::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a vertex buffer slot with the given stride.
    pub fn with_vertex_buffer(mut self, pitch: u32) -> Self {
        self.vertex_buffer_pitches.push(pitch);
        self
    }

    /// Set the primitive topology.
    pub fn with_primitive_type(mut self, primitive_type: PrimitiveType) -> Self {
        self.primitive_type = primitive_type;
        self
    }

    /// Set face culling.
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Render to a depth/stencil target of the given format.
    pub fn with_depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_stencil_format = Some(format);
        self
    }

    /// Check the descriptor for mistakes the backend would not report well.
    pub fn validate(&self) -> Result<(), String> {
        if self.color_target_formats.is_empty() {
            return Err("pipeline needs at least one color target format".to_string());
        }
        if let Some(format) = self
            .color_target_formats
            .iter()
            .find(|f| f.is_depth())
        {
            return Err(format!("color target format {format:?} is a depth format"));
        }
        if let Some(format) = self.depth_stencil_format {
            if !format.is_depth() {
                return Err(format!("depth-stencil format {format:?} is not a depth format"));
            }
        }
        if self.vertex_buffer_pitches.contains(&0) {
            return Err("vertex buffer pitch must be non-zero".to_string());
        }
        Ok(())
    }
}
