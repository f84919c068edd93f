//! # MeshLink Core
//!
//! Geometry building blocks shared by the scene model: math aliases and
//! helpers, packed vertex formats, the mesh refiner, a copy-on-write
//! attribute buffer and scoped-thread parallel iteration.

pub mod math;
pub mod mesh;
pub mod packed;
pub mod parallel;
pub mod profiling;
pub mod shared_vec;

pub use shared_vec::SharedVec;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
