//! # Lilium Demos
//!
//! Demo programs exercising Lilium command recording.
//!
//! ## Available Demos
//!
//! - `frame_loop` - Records frames from several threads on the dummy backend

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
