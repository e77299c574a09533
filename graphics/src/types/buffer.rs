//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for data buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can hold indirect draw arguments.
        const INDIRECT = 1 << 2;
        /// Buffer can be read as storage from graphics shaders.
        const GRAPHICS_STORAGE_READ = 1 << 3;
        /// Buffer can be read as storage from compute shaders.
        const COMPUTE_STORAGE_READ = 1 << 4;
        /// Buffer can be written as storage from compute shaders.
        const COMPUTE_STORAGE_WRITE = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a data buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Direction of a transfer buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferBufferUsage {
    /// CPU writes, GPU reads. Source of copy-pass uploads.
    #[default]
    Upload,
    /// GPU writes, CPU reads.
    Download,
}

/// Descriptor for creating a transfer buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TransferBufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Transfer direction.
    pub usage: TransferBufferUsage,
}

impl TransferBufferDescriptor {
    /// Create an upload transfer buffer descriptor.
    pub fn upload(size: u64) -> Self {
        Self {
            label: None,
            size,
            usage: TransferBufferUsage::Upload,
        }
    }

    /// Create a download transfer buffer descriptor.
    pub fn download(size: u64) -> Self {
        Self {
            label: None,
            size,
            usage: TransferBufferUsage::Download,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Size of one element of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexElementSize {
    /// 16-bit indices.
    #[default]
    U16,
    /// 32-bit indices.
    U32,
}

impl IndexElementSize {
    /// Size of one index in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

impl TryFrom<u32> for IndexElementSize {
    type Error = u32;

    /// Convert a byte width (2 or 4) into an element size.
    fn try_from(bytes: u32) -> Result<Self, Self::Error> {
        match bytes {
            2 => Ok(Self::U16),
            4 => Ok(Self::U32),
            other => Err(other),
        }
    }
}
