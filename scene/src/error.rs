//! Error types for the scene model.

use std::io;

use meshlink_core::mesh::RefineError;

use crate::entity::EntityType;

/// Failures while decoding a scene payload.
///
/// Any of these means the payload is unusable; the receiver should drop it
/// and ask for a full scene.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of payload")]
    UnexpectedEof,

    /// The validation hash does not match the payload contents.
    #[error("scene hash mismatch: header {expected:#018x}, contents {actual:#018x}")]
    HashMismatch { expected: u64, actual: u64 },

    #[error("unknown entity type tag {0}")]
    UnknownEntityType(u32),

    #[error("unknown asset type tag {0}")]
    UnknownAssetType(u32),

    #[error("unknown enum value {value} for {name}")]
    UnknownEnum { name: &'static str, value: u32 },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("decompression failed: {0}")]
    Compression(#[from] io::Error),
}

/// Failures while loading conversion settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Delta operators applied to entities that cannot be paired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("entity `{path}` is a {actual:?}, base is a {expected:?}")]
    KindMismatch {
        path: String,
        expected: EntityType,
        actual: EntityType,
    },

    #[error("entity {index} has id {left} in one scene and {right} in the other")]
    IdMismatch { index: usize, left: i32, right: i32 },

    #[error("scenes have {left} and {right} entities")]
    CountMismatch { left: usize, right: usize },
}

/// A mesh could not be prepared by [`Scene::import`](crate::Scene::import).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to refine mesh `{path}`: {source}")]
pub struct ImportError {
    pub path: String,
    pub source: RefineError,
}
