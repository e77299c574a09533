//! Common utilities for command recording integration tests.
//!
//! Every test runs against the dummy backend, which records the native calls
//! that reach it so tests can check what the driver would have seen.

use std::sync::Arc;

use parking_lot::Mutex;

use lilium_core::pool::LeakReport;
use lilium_gpu::{
    BufferDescriptor, BufferUsage, DataBuffer, Device, DeviceDescriptor, DummyBackend,
    GraphicsPipeline, GraphicsPipelineDescriptor, ShaderCode, Texture, TextureDescriptor,
    TextureFormat, TextureUsage, TransferBuffer, TransferBufferDescriptor,
};

/// Format of the swapchain textures handed out by the dummy backend.
pub const SWAPCHAIN_FORMAT: TextureFormat = TextureFormat::Bgra8Unorm;

/// A device on the dummy backend with every leak report captured.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub device: Arc<Device>,
    leaks: Arc<Mutex<Vec<LeakReport>>>,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let leaks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&leaks);
        let backend = Arc::new(DummyBackend::new());
        let device = Device::new(
            backend.clone(),
            &DeviceDescriptor::new("Test Device").with_leak_handler(Arc::new(
                move |report: &LeakReport| sink.lock().push(report.clone()),
            )),
        );

        Self {
            backend,
            device,
            leaks,
        }
    }

    /// Leak reports received so far.
    pub fn leaks(&self) -> Vec<LeakReport> {
        self.leaks.lock().clone()
    }

    pub fn create_vertex_buffer(&self, size: u64) -> Arc<DataBuffer> {
        self.device
            .create_data_buffer(
                &BufferDescriptor::new(size, BufferUsage::VERTEX).with_label("vertices"),
            )
            .unwrap()
    }

    pub fn create_index_buffer(&self, size: u64) -> Arc<DataBuffer> {
        self.device
            .create_data_buffer(&BufferDescriptor::new(size, BufferUsage::INDEX))
            .unwrap()
    }

    pub fn create_upload_buffer(&self, size: u64) -> Arc<TransferBuffer> {
        self.device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(size))
            .unwrap()
    }

    pub fn create_texture(&self, width: u32, height: u32, usage: TextureUsage) -> Arc<Texture> {
        self.device
            .create_texture(&TextureDescriptor::new_2d(
                width,
                height,
                TextureFormat::Rgba8Unorm,
                usage,
            ))
            .unwrap()
    }

    pub fn create_depth_texture(&self, width: u32, height: u32) -> Arc<Texture> {
        self.device
            .create_texture(&TextureDescriptor::new_2d(
                width,
                height,
                TextureFormat::Depth32Float,
                TextureUsage::DEPTH_STENCIL_TARGET,
            ))
            .unwrap()
    }

    pub fn create_pipeline(&self) -> Arc<GraphicsPipeline> {
        self.device
            .create_graphics_pipeline(
                &GraphicsPipelineDescriptor::new(
                    ShaderCode::new(vec![0u8; 16]).with_uniform_buffers(1),
                    ShaderCode::new(vec![0u8; 16]).with_samplers(1),
                    SWAPCHAIN_FORMAT,
                )
                .with_vertex_buffer(12)
                .with_label("triangle"),
            )
            .unwrap()
    }
}
