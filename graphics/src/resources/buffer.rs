//! GPU buffer resources.

use std::sync::Arc;

use bytemuck::Pod;

use crate::backend::{BufferHandle, GpuBackend, NativeResource, TransferBufferHandle};
use crate::error::GpuError;
use crate::types::{BufferDescriptor, BufferUsage, TransferBufferDescriptor, TransferBufferUsage};

/// A GPU data buffer (vertex, index, storage...).
///
/// Data buffers are created by [`Device::create_data_buffer`] and are
/// reference-counted. The native buffer is released when the last reference
/// is dropped.
///
/// [`Device::create_data_buffer`]: crate::Device::create_data_buffer
pub struct DataBuffer {
    backend: Arc<dyn GpuBackend>,
    handle: BufferHandle,
    descriptor: BufferDescriptor,
}

impl DataBuffer {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        handle: BufferHandle,
        descriptor: BufferDescriptor,
    ) -> Self {
        Self {
            backend,
            handle,
            descriptor,
        }
    }

    /// Get the native handle.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Fail unless the buffer has `usage` and `offset` lies inside it.
    pub(crate) fn check_binding(&self, usage: BufferUsage, offset: u64) -> Result<(), GpuError> {
        if !self.usage().contains(usage) {
            return Err(GpuError::InvalidParameter(format!(
                "buffer {:?} lacks {usage:?} usage",
                self.label()
            )));
        }
        if offset >= self.size() {
            return Err(GpuError::InvalidParameter(format!(
                "offset {offset} is outside buffer {:?} of {} bytes",
                self.label(),
                self.size()
            )));
        }
        Ok(())
    }
}

impl Drop for DataBuffer {
    fn drop(&mut self) {
        self.backend
            .release_resource(NativeResource::Buffer(self.handle));
    }
}

impl std::fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBuffer")
            .field("handle", &self.handle)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// A CPU-visible staging buffer used by copy passes.
///
/// Upload buffers are filled with [`write`](Self::write) and then copied into
/// data buffers or textures inside a [`CopyPass`](crate::CopyPass).
pub struct TransferBuffer {
    backend: Arc<dyn GpuBackend>,
    handle: TransferBufferHandle,
    descriptor: TransferBufferDescriptor,
}

impl TransferBuffer {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        handle: TransferBufferHandle,
        descriptor: TransferBufferDescriptor,
    ) -> Self {
        Self {
            backend,
            handle,
            descriptor,
        }
    }

    /// Get the native handle.
    pub fn handle(&self) -> TransferBufferHandle {
        self.handle
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the transfer direction.
    pub fn usage(&self) -> TransferBufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Copy raw bytes into the buffer at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), GpuError> {
        if self.usage() != TransferBufferUsage::Upload {
            return Err(GpuError::InvalidParameter(
                "only upload transfer buffers can be written".to_string(),
            ));
        }
        self.check_range(offset, data.len() as u64)?;

        self.backend
            .write_transfer_buffer(self.handle, offset, data)
            .map_err(|e| GpuError::native("write_transfer_buffer", e))
    }

    /// Copy a slice of plain-old-data values into the buffer at `offset`.
    pub fn write_slice<T: Pod>(&self, offset: u64, data: &[T]) -> Result<(), GpuError> {
        self.write(offset, bytemuck::cast_slice(data))
    }

    /// Fail unless `[offset, offset + len)` lies inside the buffer.
    pub(crate) fn check_range(&self, offset: u64, len: u64) -> Result<(), GpuError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(GpuError::InvalidParameter(format!(
                "range {offset}+{len} exceeds transfer buffer {:?} of {} bytes",
                self.label(),
                self.size()
            ))),
        }
    }
}

impl Drop for TransferBuffer {
    fn drop(&mut self) {
        self.backend
            .release_resource(NativeResource::TransferBuffer(self.handle));
    }
}

impl std::fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("handle", &self.handle)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(DataBuffer: Send, Sync);
static_assertions::assert_impl_all!(TransferBuffer: Send, Sync);
