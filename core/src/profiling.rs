//! Optional Tracy instrumentation.
//!
//! Enabled with the `profiling` feature. Without it every macro expands to
//! nothing.
//!
//! ```ignore
//! use meshlink_core::profile_scope;
//!
//! fn refine_all() {
//!     profile_scope!("refine_all");
//!     // ...
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, span, Client};

/// Create a profiling span for the current scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Start the Tracy client. Call once from the host binary.
#[cfg(feature = "profiling")]
pub fn init() {
    Client::start();
    log::info!("Tracy profiling enabled");
}

/// No-op when profiling is disabled.
#[cfg(not(feature = "profiling"))]
pub fn init() {}
