//! Tracy instrumentation for pool and command-buffer hot paths.
//!
//! Off by default. With the `profiling` feature the macros below open Tracy
//! spans, mark frames and plot values; without it they compile to nothing,
//! so instrumented code pays no cost in normal builds.
//!
//! ```toml
//! [dependencies]
//! lilium-core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! ```
//! fn submit_frame(leased: usize) {
//!     lilium_core::profile_function!();
//!     {
//!         lilium_core::profile_scope!("record");
//!     }
//!     lilium_core::profile_plot!("leased", leased);
//!     lilium_core::frame_mark!();
//! }
//! # submit_frame(3);
//! ```

#[cfg(feature = "profiling")]
#[doc(hidden)]
pub use tracy_client;

#[cfg(feature = "profiling")]
mod enabled {
    /// Mark the end of a frame.
    #[macro_export]
    macro_rules! frame_mark {
        () => {
            $crate::profiling::tracy_client::frame_mark()
        };
    }

    /// Span from here to the end of the enclosing block.
    #[macro_export]
    macro_rules! profile_scope {
        ($name:expr) => {
            let _lilium_span = $crate::profiling::tracy_client::span!($name);
        };
    }

    /// Span named after the enclosing function.
    #[macro_export]
    macro_rules! profile_function {
        () => {
            let _lilium_span = $crate::profiling::tracy_client::span!();
        };
    }

    /// Plot a numeric value once per call.
    #[macro_export]
    macro_rules! profile_plot {
        ($name:expr, $value:expr) => {
            $crate::profiling::tracy_client::plot!($name, $value as f64)
        };
    }
}

#[cfg(not(feature = "profiling"))]
mod disabled {
    #[macro_export]
    macro_rules! frame_mark {
        () => {};
    }

    #[macro_export]
    macro_rules! profile_scope {
        ($name:expr) => {};
    }

    #[macro_export]
    macro_rules! profile_function {
        () => {};
    }

    #[macro_export]
    macro_rules! profile_plot {
        ($name:expr, $value:expr) => {
            let _ = $value;
        };
    }
}

pub use crate::{frame_mark, profile_function, profile_plot, profile_scope};

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand() {
        crate::frame_mark!();
        crate::profile_scope!("scope");
        crate::profile_function!();
        crate::profile_plot!("value", 42usize);
    }
}
