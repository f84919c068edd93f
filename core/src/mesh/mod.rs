//! Mesh refinement.
//!
//! Turns arbitrary polygon soup (per-face vertex counts plus corner indices)
//! into GPU-ready index buffers:
//!
//! - [`MeshConnectionInfo`] - vertex-to-face adjacency and the weld map
//! - [`MeshRefiner`] - vertex deduplication, splitting, retopology and submeshes
//! - [`generate_normals_poly`] / [`generate_normals_with_smooth_angle`] /
//!   [`generate_tangents`] - attribute synthesis

mod connection;
mod error;
mod normals;
mod refiner;
mod topology;

pub use connection::MeshConnectionInfo;
pub use error::RefineError;
pub use normals::{generate_normals_poly, generate_normals_with_smooth_angle, generate_tangents};
pub use refiner::{MeshRefiner, RefineState, RefinedMesh, Split, Submesh, Topology};
pub use topology::{face_offsets, triangulated_index_count, validate_topology, Faces};
