//! Backend error types.

use thiserror::Error;

/// Errors reported by a [`GpuBackend`](super::GpuBackend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The native call failed; the message comes from the driver.
    #[error("{0}")]
    CallFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// The backend rejected a parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
