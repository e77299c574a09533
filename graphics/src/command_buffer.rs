//! Command buffers.
//!
//! A [`CommandBuffer`] is a unit of GPU work recorded on the CPU and
//! submitted atomically. Command buffers are pooled by the [`Device`]:
//! [`Device::acquire_command_buffer`] leases one and binds it to a fresh
//! native handle, and [`submit`](CommandBuffer::submit) or
//! [`cancel`](CommandBuffer::cancel) hands it back.
//!
//! # Ordering
//!
//! Commands of two command buffers execute on the GPU in the order their
//! submits complete, not the order they were acquired. Several command
//! buffers can be recorded at once, also from different threads, but each
//! one belongs to the thread that acquired it.
//!
//! [`Device`]: crate::Device
//! [`Device::acquire_command_buffer`]: crate::Device::acquire_command_buffer

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytemuck::Pod;
use glam::Mat4;
use lilium_core::pool::{Lease, Pool, Poolable};

use crate::backend::{CommandBufferHandle, CopyPassHandle, GpuBackend};
use crate::copy_pass::CopyPass;
use crate::error::{CancelError, GpuError, log_native_failure};
use crate::render_pass::{RenderPass, RenderPassState};
use crate::resources::SwapchainTexture;
use crate::types::{Color, ColorTargetInfo, DepthStencilTargetInfo, WindowId};

/// The pass currently open on a command buffer.
pub(crate) enum ActivePass {
    Render(Lease<RenderPassState>),
    Copy(CopyPassHandle),
}

/// Pooled state behind a [`CommandBuffer`].
///
/// `Unbound` while in the pool, `Bound` between [`bind`](Self::bind) and the
/// terminal submit or cancel, `Submitted` until the pool resets it.
pub(crate) struct CommandRecording {
    backend: Arc<dyn GpuBackend>,
    render_passes: Arc<Pool<RenderPassState>>,
    /// Raw native handle, 0 when unbound.
    handle: AtomicU64,
    submitted: AtomicBool,
    swapchain_acquired: bool,
    active_pass: Option<ActivePass>,
}

impl CommandRecording {
    pub(crate) fn new(
        backend: Arc<dyn GpuBackend>,
        render_passes: Arc<Pool<RenderPassState>>,
    ) -> Self {
        Self {
            backend,
            render_passes,
            handle: AtomicU64::new(0),
            submitted: AtomicBool::new(false),
            swapchain_acquired: false,
            active_pass: None,
        }
    }

    /// Bind a freshly acquired native command buffer.
    pub(crate) fn bind(&mut self, handle: CommandBufferHandle) {
        debug_assert_eq!(
            self.handle.load(Ordering::Acquire),
            0,
            "command buffer bound twice"
        );
        self.handle.store(handle.raw(), Ordering::Release);
        self.submitted.store(false, Ordering::Release);
        self.swapchain_acquired = false;
    }

    pub(crate) fn handle(&self) -> Option<CommandBufferHandle> {
        CommandBufferHandle::new(self.handle.load(Ordering::Acquire))
    }

    pub(crate) fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::Acquire)
    }

    pub(crate) fn backend(&self) -> &dyn GpuBackend {
        &*self.backend
    }

    pub(crate) fn active_pass(&self) -> Option<&ActivePass> {
        self.active_pass.as_ref()
    }

    pub(crate) fn active_pass_mut(&mut self) -> Option<&mut ActivePass> {
        self.active_pass.as_mut()
    }

    /// Handle of a bound, unsubmitted command buffer with no pass open.
    fn recording_handle(&self) -> Result<CommandBufferHandle, GpuError> {
        if self.is_submitted() {
            return Err(GpuError::CommandBufferSubmitted);
        }
        let handle = self.handle().ok_or(GpuError::CommandBufferSubmitted)?;
        if self.active_pass.is_some() {
            return Err(GpuError::PassAlreadyOpen);
        }
        Ok(handle)
    }

    fn acquire_swapchain_texture(
        &mut self,
        window: WindowId,
    ) -> Result<Option<SwapchainTexture>, GpuError> {
        let handle = self.recording_handle()?;
        let texture = self
            .backend
            .wait_and_acquire_swapchain_texture(handle, window)
            .map_err(|e| GpuError::native("wait_and_acquire_swapchain_texture", e))?;

        if texture.is_some() {
            self.swapchain_acquired = true;
        }
        Ok(texture)
    }

    fn begin_render_pass(
        &mut self,
        depth_stencil: Option<&DepthStencilTargetInfo<'_>>,
        color_targets: &[ColorTargetInfo<'_>],
    ) -> Result<(), GpuError> {
        let handle = self.recording_handle()?;

        if color_targets.is_empty() {
            return Err(GpuError::NoColorTargets);
        }
        for target in color_targets {
            target.validate()?;
        }
        if let Some(depth_stencil) = depth_stencil {
            depth_stencil.validate()?;
        }

        let pass = self
            .backend
            .begin_render_pass(handle, color_targets, depth_stencil)
            .map_err(|e| GpuError::native("begin_render_pass", e))?;

        let Some(mut state) = self.render_passes.get_or_create() else {
            self.backend.end_render_pass(pass);
            return Err(GpuError::DeviceDisposed);
        };
        state.open(pass);
        self.active_pass = Some(ActivePass::Render(state));
        Ok(())
    }

    fn begin_copy_pass(&mut self) -> Result<(), GpuError> {
        let handle = self.recording_handle()?;
        let pass = self
            .backend
            .begin_copy_pass(handle)
            .map_err(|e| GpuError::native("begin_copy_pass", e))?;
        self.active_pass = Some(ActivePass::Copy(pass));
        Ok(())
    }

    fn push_uniform_data(&self, stage: ShaderStage, slot: u32, data: &[u8]) {
        debug_assert!(!self.is_submitted(), "uniform pushed to a submitted command buffer");
        let Some(handle) = self.handle() else {
            return;
        };
        match stage {
            ShaderStage::Vertex => self.backend.push_vertex_uniform_data(handle, slot, data),
            ShaderStage::Fragment => self.backend.push_fragment_uniform_data(handle, slot, data),
        }
    }

    /// End the open pass, if any. Render pass state goes back to its pool.
    pub(crate) fn end_active_pass(&mut self) {
        match self.active_pass.take() {
            Some(ActivePass::Render(mut state)) => {
                state.end();
                state.release();
            }
            Some(ActivePass::Copy(pass)) => self.backend.end_copy_pass(pass),
            None => {}
        }
    }

    /// Submit to the native API at most once per binding.
    ///
    /// Safe to race: only the caller that flips `submitted` performs the
    /// native call. Returns whether this call submitted. A native failure is
    /// logged and absorbed; the command buffer counts as submitted anyway.
    pub(crate) fn submit_native(&self) -> bool {
        if self
            .submitted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let Some(handle) = CommandBufferHandle::new(self.handle.swap(0, Ordering::AcqRel)) else {
            return false;
        };
        if let Err(error) = self.backend.submit_command_buffer(handle) {
            log_native_failure("submit_command_buffer", &error);
        }
        true
    }

    /// Force-end any open pass, then submit.
    pub(crate) fn force_submit(&mut self) -> bool {
        self.end_active_pass();
        self.submit_native()
    }

    fn cancel(&mut self) -> Result<(), GpuError> {
        if self.is_submitted() {
            return Err(GpuError::CommandBufferSubmitted);
        }
        if self.swapchain_acquired {
            return Err(GpuError::CancelAfterSwapchainAcquire);
        }
        let handle = self.handle().ok_or(GpuError::CommandBufferSubmitted)?;

        self.end_active_pass();
        self.backend
            .cancel_command_buffer(handle)
            .map_err(|e| GpuError::native("cancel_command_buffer", e))?;

        self.handle.store(0, Ordering::Release);
        self.submitted.store(true, Ordering::Release);
        Ok(())
    }
}

impl Poolable for CommandRecording {
    fn reset(&mut self) {
        if self.force_submit() {
            log::debug!("CommandBuffer: returned unsubmitted, submitted on reset");
        }
        self.handle.store(0, Ordering::Release);
        self.submitted.store(false, Ordering::Release);
        self.swapchain_acquired = false;
    }

    fn dispose(&mut self) {
        if self.force_submit() {
            log::debug!("CommandBuffer: submitted on dispose");
        }
    }
}

#[derive(Clone, Copy)]
enum ShaderStage {
    Vertex,
    Fragment,
}

/// A command buffer being recorded.
///
/// Obtained from [`Device::acquire_command_buffer`]. Must end with exactly
/// one of [`submit`](Self::submit) or [`cancel`](Self::cancel), both of which
/// consume it. A command buffer dropped without either is reported as a leak
/// and submitted so the native handle is not lost.
///
/// # Example
///
/// ```
/// use lilium_gpu::{Color, ColorTargetInfo, Device, WindowId};
///
/// let device = Device::with_dummy_backend();
/// let mut cmd = device.acquire_command_buffer()?;
///
/// match cmd.acquire_swapchain_texture(WindowId(1))? {
///     Some(swapchain) => {
///         let target = ColorTargetInfo::new(&swapchain).with_clear(Color::CORNFLOWER_BLUE);
///         cmd.begin_render_pass(None, &[target])?.end();
///         cmd.submit();
///     }
///     None => cmd.cancel().map_err(|e| e.error)?,
/// }
/// # Ok::<(), lilium_gpu::GpuError>(())
/// ```
///
/// [`Device::acquire_command_buffer`]: crate::Device::acquire_command_buffer
pub struct CommandBuffer {
    recording: Lease<CommandRecording>,
}

impl CommandBuffer {
    pub(crate) fn new(recording: Lease<CommandRecording>) -> Self {
        Self { recording }
    }

    /// Native handle of the command buffer.
    pub fn handle(&self) -> Option<CommandBufferHandle> {
        self.recording.handle()
    }

    /// Check whether a swapchain texture has been acquired. Once it has, the
    /// command buffer can no longer be cancelled.
    pub fn has_swapchain_texture(&self) -> bool {
        self.recording.swapchain_acquired
    }

    /// Check whether a pass is currently open.
    ///
    /// Only possible if a pass scope was leaked with [`std::mem::forget`].
    pub fn has_open_pass(&self) -> bool {
        self.recording.active_pass.is_some()
    }

    /// Wait for a swapchain texture of `window` and acquire it.
    ///
    /// Returns `Ok(None)` if no texture is available (e.g. the window is
    /// minimized); the command buffer can then still be cancelled. The
    /// texture is presented when the command buffer is submitted. Acquiring
    /// twice for the same window in one command buffer is an error.
    pub fn acquire_swapchain_texture(
        &mut self,
        window: WindowId,
    ) -> Result<Option<SwapchainTexture>, GpuError> {
        self.recording.acquire_swapchain_texture(window)
    }

    /// Begin a render pass.
    ///
    /// At least one color target is required. The pass borrows the command
    /// buffer until it ends.
    ///
    /// # Errors
    ///
    /// - [`GpuError::NoColorTargets`] if `color_targets` is empty
    /// - [`GpuError::PassAlreadyOpen`] if a leaked pass is still open
    /// - [`GpuError::InvalidParameter`] if a target texture has the wrong
    ///   usage or format
    /// - [`GpuError::NativeFunctionFailed`] if the backend fails
    /// - [`GpuError::DeviceDisposed`] if the device is gone
    pub fn begin_render_pass(
        &mut self,
        depth_stencil: Option<&DepthStencilTargetInfo<'_>>,
        color_targets: &[ColorTargetInfo<'_>],
    ) -> Result<RenderPass<'_>, GpuError> {
        lilium_core::profile_scope!("begin_render_pass");
        self.recording.begin_render_pass(depth_stencil, color_targets)?;
        Ok(RenderPass::new(&mut self.recording))
    }

    /// Begin a copy pass.
    pub fn begin_copy_pass(&mut self) -> Result<CopyPass<'_>, GpuError> {
        self.recording.begin_copy_pass()?;
        Ok(CopyPass::new(&mut self.recording))
    }

    /// Push plain-old-data to a vertex shader uniform slot for subsequent
    /// draws.
    pub fn push_vertex_uniform_data<T: Pod>(&mut self, slot: u32, data: &T) {
        self.recording
            .push_uniform_data(ShaderStage::Vertex, slot, bytemuck::bytes_of(data));
    }

    /// Push a matrix to a vertex shader uniform slot.
    pub fn push_vertex_uniform_matrix(&mut self, slot: u32, matrix: &Mat4) {
        self.push_vertex_uniform_data(slot, matrix);
    }

    /// Push plain-old-data to a fragment shader uniform slot for subsequent
    /// draws.
    pub fn push_fragment_uniform_data<T: Pod>(&mut self, slot: u32, data: &T) {
        self.recording
            .push_uniform_data(ShaderStage::Fragment, slot, bytemuck::bytes_of(data));
    }

    /// Push a color to a fragment shader uniform slot.
    pub fn push_fragment_uniform_color(&mut self, slot: u32, color: Color) {
        self.push_fragment_uniform_data(slot, &color);
    }

    /// Submit the recorded commands and return the command buffer to its
    /// pool.
    ///
    /// An open pass is ended first. A native failure is logged, not
    /// returned: the command buffer is gone either way.
    pub fn submit(mut self) {
        lilium_core::profile_function!();
        self.recording.force_submit();
        log::trace!("CommandBuffer: submitted");
        self.recording.release();
    }

    /// Discard the recorded commands and return the command buffer to its
    /// pool.
    ///
    /// # Errors
    ///
    /// Fails with [`GpuError::CancelAfterSwapchainAcquire`] once a swapchain
    /// texture was acquired, or with [`GpuError::NativeFunctionFailed`] if the
    /// backend refuses. The command buffer is handed back inside the
    /// [`CancelError`] and must still be submitted.
    pub fn cancel(mut self) -> Result<(), CancelError> {
        match self.recording.cancel() {
            Ok(()) => {
                log::trace!("CommandBuffer: cancelled");
                self.recording.release();
                Ok(())
            }
            Err(error) => Err(CancelError {
                error,
                command_buffer: self,
            }),
        }
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle())
            .field("swapchain_acquired", &self.has_swapchain_texture())
            .field("pass_open", &self.has_open_pass())
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandBuffer: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOp, DummyBackend};
    use lilium_core::pool::PoolDescriptor;

    fn recording(backend: &Arc<DummyBackend>) -> CommandRecording {
        let passes = Pool::new(PoolDescriptor::new("passes"), {
            let backend: Arc<dyn GpuBackend> = backend.clone();
            move || RenderPassState::new(backend.clone())
        });
        CommandRecording::new(backend.clone(), passes)
    }

    fn bound_recording(backend: &Arc<DummyBackend>) -> CommandRecording {
        let mut recording = recording(backend);
        recording.bind(backend.acquire_command_buffer().unwrap());
        recording
    }

    #[test]
    fn test_racing_submits_reach_native_once() {
        let backend = Arc::new(DummyBackend::new());
        let recording = bound_recording(&backend);

        let submitted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| recording.submit_native()))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });

        assert_eq!(submitted, 1);
        assert_eq!(backend.count(BackendOp::SubmitCommandBuffer), 1);
        assert!(recording.handle().is_none());
    }

    #[test]
    fn test_repeated_submits_reach_native_once() {
        let backend = Arc::new(DummyBackend::new());
        let mut recording = bound_recording(&backend);

        assert!(recording.force_submit());
        assert!(!recording.force_submit());
        assert!(!recording.submit_native());
        recording.reset();

        assert_eq!(backend.count(BackendOp::SubmitCommandBuffer), 1);
    }

    #[test]
    fn test_reset_submits_unsubmitted_buffer() {
        let backend = Arc::new(DummyBackend::new());
        let mut recording = bound_recording(&backend);

        recording.reset();

        assert_eq!(backend.count(BackendOp::SubmitCommandBuffer), 1);
        assert_eq!(backend.live_command_buffers(), 0);
        assert!(recording.handle().is_none());
        assert!(!recording.is_submitted());
        assert!(!recording.swapchain_acquired);
        assert!(recording.active_pass.is_none());
    }

    #[test]
    fn test_reset_of_unbound_buffer_calls_nothing() {
        let backend = Arc::new(DummyBackend::new());
        let mut recording = recording(&backend);
        recording.reset();
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_submit_failure_is_absorbed() {
        let backend = Arc::new(DummyBackend::new());
        let recording = bound_recording(&backend);
        backend.fail_next(BackendOp::SubmitCommandBuffer);

        assert!(recording.submit_native());
        assert!(recording.is_submitted());
        assert!(recording.handle().is_none());
    }

    #[test]
    fn test_unbound_buffer_rejects_recording() {
        let backend = Arc::new(DummyBackend::new());
        let mut recording = recording(&backend);
        assert_eq!(
            recording.begin_copy_pass(),
            Err(GpuError::CommandBufferSubmitted)
        );
    }

    #[test]
    fn test_submitted_buffer_rejects_recording() {
        let backend = Arc::new(DummyBackend::new());
        let mut recording = bound_recording(&backend);
        assert!(recording.submit_native());

        assert_eq!(
            recording.begin_render_pass(None, &[]),
            Err(GpuError::CommandBufferSubmitted)
        );
        assert_eq!(
            recording.acquire_swapchain_texture(WindowId(1)),
            Err(GpuError::CommandBufferSubmitted)
        );
        assert_eq!(recording.cancel(), Err(GpuError::CommandBufferSubmitted));
        assert_eq!(backend.count(BackendOp::BeginRenderPass), 0);
    }

    #[test]
    fn test_dispose_ends_open_copy_pass_before_submit() {
        let backend = Arc::new(DummyBackend::new());
        let mut recording = bound_recording(&backend);
        recording.begin_copy_pass().unwrap();
        backend.clear_calls();

        recording.dispose();

        assert_eq!(
            backend.ops(),
            vec![BackendOp::EndCopyPass, BackendOp::SubmitCommandBuffer]
        );
    }
}
