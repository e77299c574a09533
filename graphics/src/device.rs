//! Graphics device.
//!
//! The [`Device`] is the main interface for recording GPU work and creating
//! GPU resources. It owns the pools command buffers and render passes are
//! leased from, and wires them to a [`GpuBackend`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lilium_core::pool::{LeakHandler, Pool, PoolDescriptor, PoolStats};

use crate::backend::GpuBackend;
use crate::command_buffer::{CommandBuffer, CommandRecording};
use crate::error::GpuError;
use crate::render_pass::RenderPassState;
use crate::resources::{DataBuffer, GraphicsPipeline, Sampler, Texture, TransferBuffer};
use crate::types::{
    BufferDescriptor, GraphicsPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
    TransferBufferDescriptor,
};

/// Name of the device's command buffer pool.
pub const COMMAND_BUFFER_POOL_NAME: &str = "GpuCommandBuffers";
/// Name of the device's render pass pool.
pub const RENDER_PASS_POOL_NAME: &str = "GpuRenderPasses";

/// Descriptor for creating a [`Device`].
#[derive(Clone)]
pub struct DeviceDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Report command buffers and render passes that are dropped instead of
    /// submitted or ended.
    pub track_leaks: bool,
    /// Command buffer states created up front.
    pub initial_command_buffers: usize,
    /// Render pass states created up front.
    pub initial_render_passes: usize,
    /// Called for every leak reported by the device's pools.
    pub leak_handler: Option<LeakHandler>,
}

impl DeviceDescriptor {
    /// Create a descriptor with a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Enable or disable leak tracking.
    pub fn with_leak_tracking(mut self, track_leaks: bool) -> Self {
        self.track_leaks = track_leaks;
        self
    }

    /// Set how many command buffer states are created up front.
    pub fn with_initial_command_buffers(mut self, count: usize) -> Self {
        self.initial_command_buffers = count;
        self
    }

    /// Set how many render pass states are created up front.
    pub fn with_initial_render_passes(mut self, count: usize) -> Self {
        self.initial_render_passes = count;
        self
    }

    /// Set the leak callback.
    pub fn with_leak_handler(mut self, handler: LeakHandler) -> Self {
        self.leak_handler = Some(handler);
        self
    }

    fn pool_descriptor(&self, name: &str, initial_capacity: usize) -> PoolDescriptor {
        let mut descriptor = PoolDescriptor::new(name)
            .with_initial_capacity(initial_capacity)
            .with_leak_tracking(self.track_leaks);
        if let Some(handler) = &self.leak_handler {
            descriptor = descriptor.with_leak_handler(Arc::clone(handler));
        }
        descriptor
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            track_leaks: true,
            initial_command_buffers: 0,
            initial_render_passes: 0,
            leak_handler: None,
        }
    }
}

impl std::fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("label", &self.label)
            .field("track_leaks", &self.track_leaks)
            .field("initial_command_buffers", &self.initial_command_buffers)
            .field("initial_render_passes", &self.initial_render_passes)
            .field("leak_handler", &self.leak_handler.is_some())
            .finish()
    }
}

/// A graphics device.
///
/// # Thread Safety
///
/// `Device` is `Send + Sync`. Command buffers can be acquired and recorded
/// on any number of threads at once; each command buffer stays with the
/// thread that records it.
///
/// # Example
///
/// ```
/// use lilium_gpu::{BufferDescriptor, BufferUsage, Device};
///
/// let device = Device::with_dummy_backend();
/// let vertices = device.create_data_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
///
/// let cmd = device.acquire_command_buffer()?;
/// cmd.submit();
/// # Ok::<(), lilium_gpu::GpuError>(())
/// ```
pub struct Device {
    label: Option<String>,
    backend: Arc<dyn GpuBackend>,
    command_buffers: Arc<Pool<CommandRecording>>,
    render_passes: Arc<Pool<RenderPassState>>,
    disposed: AtomicBool,
}

impl Device {
    /// Create a device on top of `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>, descriptor: &DeviceDescriptor) -> Arc<Self> {
        let render_passes = Pool::new(
            descriptor.pool_descriptor(RENDER_PASS_POOL_NAME, descriptor.initial_render_passes),
            {
                let backend = Arc::clone(&backend);
                move || RenderPassState::new(Arc::clone(&backend))
            },
        );

        let command_buffers = Pool::new(
            descriptor
                .pool_descriptor(COMMAND_BUFFER_POOL_NAME, descriptor.initial_command_buffers),
            {
                let backend = Arc::clone(&backend);
                let render_passes = Arc::clone(&render_passes);
                move || CommandRecording::new(Arc::clone(&backend), Arc::clone(&render_passes))
            },
        );

        log::debug!(
            "Device: created {:?} on {} backend",
            descriptor.label,
            backend.name()
        );

        Arc::new(Self {
            label: descriptor.label.clone(),
            backend,
            command_buffers,
            render_passes,
            disposed: AtomicBool::new(false),
        })
    }

    /// Create a device on the dummy backend.
    #[cfg(feature = "dummy")]
    pub fn with_dummy_backend() -> Arc<Self> {
        Self::new(
            Arc::new(crate::backend::DummyBackend::new()),
            &DeviceDescriptor::new("Dummy Device"),
        )
    }

    /// Get the device label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the backend.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Acquire a command buffer ready for recording.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::DeviceDisposed`] after [`dispose`](Self::dispose),
    /// or [`GpuError::NativeFunctionFailed`] if the backend can't provide a
    /// command buffer.
    pub fn acquire_command_buffer(&self) -> Result<CommandBuffer, GpuError> {
        lilium_core::profile_function!();

        if self.is_disposed() {
            return Err(GpuError::DeviceDisposed);
        }
        let mut recording = self
            .command_buffers
            .get_or_create()
            .ok_or(GpuError::DeviceDisposed)?;

        match self.backend.acquire_command_buffer() {
            Ok(handle) => {
                recording.bind(handle);
                log::trace!("Device: acquired command buffer {}", handle.raw());
                Ok(CommandBuffer::new(recording))
            }
            Err(e) => {
                recording.release();
                Err(GpuError::native("acquire_command_buffer", e))
            }
        }
    }

    /// Create a data buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or the backend fails.
    pub fn create_data_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<DataBuffer>, GpuError> {
        self.ensure_alive()?;
        if descriptor.size == 0 {
            return Err(GpuError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let handle = self
            .backend
            .create_data_buffer(descriptor)
            .map_err(|e| GpuError::native("create_data_buffer", e))?;

        log::trace!(
            "Device: created data buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );
        Ok(Arc::new(DataBuffer::new(
            Arc::clone(&self.backend),
            handle,
            descriptor.clone(),
        )))
    }

    /// Create a transfer buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or the backend fails.
    pub fn create_transfer_buffer(
        &self,
        descriptor: &TransferBufferDescriptor,
    ) -> Result<Arc<TransferBuffer>, GpuError> {
        self.ensure_alive()?;
        if descriptor.size == 0 {
            return Err(GpuError::InvalidParameter(
                "transfer buffer size cannot be zero".to_string(),
            ));
        }

        let handle = self
            .backend
            .create_transfer_buffer(descriptor)
            .map_err(|e| GpuError::native("create_transfer_buffer", e))?;

        log::trace!(
            "Device: created {:?} transfer buffer {:?}, size={}",
            descriptor.usage,
            descriptor.label,
            descriptor.size
        );
        Ok(Arc::new(TransferBuffer::new(
            Arc::clone(&self.backend),
            handle,
            descriptor.clone(),
        )))
    }

    /// Create a texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is invalid (zero size, impossible
    /// mip chain, no usage) or the backend fails.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Arc<Texture>, GpuError> {
        self.ensure_alive()?;
        descriptor.validate().map_err(GpuError::InvalidParameter)?;

        let handle = self
            .backend
            .create_texture(descriptor)
            .map_err(|e| GpuError::native("create_texture", e))?;

        log::trace!(
            "Device: created texture {:?}, {}x{}x{}, format={:?}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth,
            descriptor.format
        );
        Ok(Arc::new(Texture::new(
            Arc::clone(&self.backend),
            handle,
            descriptor.clone(),
        )))
    }

    /// Create a sampler.
    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<Arc<Sampler>, GpuError> {
        self.ensure_alive()?;
        descriptor.validate().map_err(GpuError::InvalidParameter)?;

        let handle = self
            .backend
            .create_sampler(descriptor)
            .map_err(|e| GpuError::native("create_sampler", e))?;

        log::trace!("Device: created sampler {:?}", descriptor.label);
        Ok(Arc::new(Sampler::new(
            Arc::clone(&self.backend),
            handle,
            descriptor.clone(),
        )))
    }

    /// Create a graphics pipeline.
    pub fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<Arc<GraphicsPipeline>, GpuError> {
        self.ensure_alive()?;
        descriptor.validate().map_err(GpuError::InvalidParameter)?;

        let handle = self
            .backend
            .create_graphics_pipeline(descriptor)
            .map_err(|e| GpuError::native("create_graphics_pipeline", e))?;

        log::trace!("Device: created graphics pipeline {:?}", descriptor.label);
        Ok(Arc::new(GraphicsPipeline::new(
            Arc::clone(&self.backend),
            handle,
            descriptor,
        )))
    }

    /// Counters of the command buffer pool.
    pub fn command_buffer_stats(&self) -> PoolStats {
        self.command_buffers.stats()
    }

    /// Counters of the render pass pool.
    pub fn render_pass_stats(&self) -> PoolStats {
        self.render_passes.stats()
    }

    /// Dispose the device's pools.
    ///
    /// Pooled command buffers are disposed. Command buffers still being
    /// recorded stay usable and are disposed, not pooled, when they are
    /// submitted or cancelled. Acquiring fails from now on.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.command_buffers.dispose();
        self.render_passes.dispose();
        log::debug!("Device: disposed {:?}", self.label);
    }

    /// Check whether the device has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<(), GpuError> {
        if self.is_disposed() {
            Err(GpuError::DeviceDisposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("label", &self.label)
            .field("backend", &self.backend.name())
            .field("command_buffers", &self.command_buffer_stats())
            .field("render_passes", &self.render_pass_stats())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);
static_assertions::assert_impl_all!(DeviceDescriptor: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOp, DummyBackend};
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    fn create_test_device() -> (Arc<DummyBackend>, Arc<Device>) {
        let backend = Arc::new(DummyBackend::new());
        let device = Device::new(backend.clone(), &DeviceDescriptor::new("Test Device"));
        (backend, device)
    }

    #[test]
    fn test_device_label() {
        let (_, device) = create_test_device();
        assert_eq!(device.label(), Some("Test Device"));
        assert_eq!(device.backend().name(), "Dummy");
    }

    #[test]
    fn test_prewarmed_pools() {
        let backend = Arc::new(DummyBackend::new());
        let device = Device::new(
            backend,
            &DeviceDescriptor::default()
                .with_initial_command_buffers(4)
                .with_initial_render_passes(2),
        );

        assert_eq!(device.command_buffer_stats().available, 4);
        assert_eq!(device.render_pass_stats().available, 2);
    }

    #[test]
    fn test_acquire_reuses_pooled_state() {
        let (backend, device) = create_test_device();

        device.acquire_command_buffer().unwrap().submit();
        device.acquire_command_buffer().unwrap().submit();

        let stats = device.command_buffer_stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.leased, 0);
        assert_eq!(backend.count(BackendOp::SubmitCommandBuffer), 2);
        assert_eq!(backend.live_command_buffers(), 0);
    }

    #[test]
    fn test_failed_native_acquire_returns_lease() {
        let (backend, device) = create_test_device();
        backend.fail_next(BackendOp::AcquireCommandBuffer);

        let err = device.acquire_command_buffer().unwrap_err();
        assert!(matches!(
            err,
            GpuError::NativeFunctionFailed {
                function: "acquire_command_buffer",
                ..
            }
        ));

        let stats = device.command_buffer_stats();
        assert_eq!(stats.leased, 0);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.leaked, 0);
    }

    #[test]
    fn test_create_data_buffer() {
        let (backend, device) = create_test_device();
        let buffer = device
            .create_data_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))
            .unwrap();

        assert_eq!(buffer.size(), 1024);
        assert_eq!(backend.live_resources(), 1);
        drop(buffer);
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_create_data_buffer_zero_size() {
        let (_, device) = create_test_device();
        let result = device.create_data_buffer(&BufferDescriptor::new(0, BufferUsage::VERTEX));
        assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
    }

    #[test]
    fn test_create_texture() {
        let (_, device) = create_test_device();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                256,
                128,
                TextureFormat::Rgba8Unorm,
                TextureUsage::SAMPLER,
            ))
            .unwrap();

        assert_eq!(texture.width(), 256);
        assert_eq!(texture.height(), 128);
    }

    #[test]
    fn test_create_texture_zero_size() {
        let (_, device) = create_test_device();
        let result = device.create_texture(&TextureDescriptor::new_2d(
            0,
            128,
            TextureFormat::Rgba8Unorm,
            TextureUsage::SAMPLER,
        ));
        assert!(matches!(result, Err(GpuError::InvalidParameter(_))));
    }

    #[test]
    fn test_native_creation_failure() {
        let (backend, device) = create_test_device();
        backend.fail_next(BackendOp::CreateSampler);

        let result = device.create_sampler(&SamplerDescriptor::default());
        assert!(matches!(
            result,
            Err(GpuError::NativeFunctionFailed {
                function: "create_sampler",
                ..
            })
        ));
        assert_eq!(backend.live_resources(), 0);
    }

    #[test]
    fn test_dispose() {
        let (_, device) = create_test_device();
        device.acquire_command_buffer().unwrap().submit();

        device.dispose();
        device.dispose();

        assert!(device.is_disposed());
        assert!(device.command_buffer_stats().disposed);
        assert!(device.render_pass_stats().disposed);
        assert_eq!(
            device.acquire_command_buffer().unwrap_err(),
            GpuError::DeviceDisposed
        );
        assert_eq!(
            device
                .create_data_buffer(&BufferDescriptor::new(4, BufferUsage::VERTEX))
                .unwrap_err(),
            GpuError::DeviceDisposed
        );
    }

    #[test]
    fn test_drop_disposes_idle_pools_quietly() {
        let (backend, device) = create_test_device();
        device.acquire_command_buffer().unwrap().submit();
        backend.clear_calls();

        drop(device);

        assert!(backend.calls().is_empty());
    }
}
