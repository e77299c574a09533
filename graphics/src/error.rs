//! Graphics error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::command_buffer::CommandBuffer;

/// Log target used for failed native calls.
pub const NATIVE_LOG_TARGET: &str = "lilium::native";

/// Errors that can occur in the graphics system.
///
/// Protocol violations (`CommandBufferSubmitted`, `PassAlreadyOpen`,
/// `PipelineNotBound`, ...) indicate a bug in the caller; native failures
/// come from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    /// The command buffer was already submitted or cancelled.
    #[error("command buffer has already been submitted")]
    CommandBufferSubmitted,
    /// A render pass was begun without any color target.
    #[error("color render-targets can not be empty")]
    NoColorTargets,
    /// Another pass is still open on the command buffer.
    #[error("a pass is already open on this command buffer")]
    PassAlreadyOpen,
    /// A draw was recorded before any pipeline was bound.
    #[error("no graphics pipeline is bound in this render pass")]
    PipelineNotBound,
    /// Cancel was requested after a swapchain texture was acquired.
    #[error("cannot cancel a command buffer after a swapchain texture was acquired")]
    CancelAfterSwapchainAcquire,
    /// A native backend call failed.
    #[error("native function `{function}` failed: {source}")]
    NativeFunctionFailed {
        /// Name of the backend function.
        function: &'static str,
        /// What the backend reported.
        #[source]
        source: BackendError,
    },
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The device has been disposed.
    #[error("device has been disposed")]
    DeviceDisposed,
}

impl GpuError {
    /// Log a failed native call and wrap it.
    pub(crate) fn native(function: &'static str, source: BackendError) -> Self {
        log_native_failure(function, &source);
        Self::NativeFunctionFailed { function, source }
    }
}

/// Log a failed native call that is absorbed rather than returned.
pub(crate) fn log_native_failure(function: &'static str, error: &BackendError) {
    log::error!(
        target: NATIVE_LOG_TARGET,
        "Native function `{function}` failed: {error}"
    );
}

/// A failed [`CommandBuffer::cancel`].
///
/// The command buffer is handed back so the caller can still submit it.
#[derive(Debug, Error)]
#[error("failed to cancel command buffer: {error}")]
pub struct CancelError {
    /// Why the cancel failed.
    #[source]
    pub error: GpuError,
    /// The command buffer, still recording.
    pub command_buffer: CommandBuffer,
}

impl CancelError {
    /// Take the command buffer back.
    pub fn into_command_buffer(self) -> CommandBuffer {
        self.command_buffer
    }
}
