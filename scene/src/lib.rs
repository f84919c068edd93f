//! # MeshLink Scene
//!
//! Incremental scene sync model. A sender builds a [`Scene`] every frame,
//! [`strip`](Scene::strip)s it against the previous one and ships the
//! compressed delta; the receiver [`merge`](Scene::merge)s it back,
//! [`import`](Scene::import)s it into canonical space and builds the
//! hierarchy.

pub mod animation;
pub mod asset;
pub mod codec;
pub mod convert;
pub mod entity;
pub mod error;
pub mod info;
pub mod scene;
pub mod sender;
pub mod settings;

pub use animation::{Animation, AnimationClip, AnimationCurve, ChannelFlags, Key, Keyframes};
pub use asset::{Asset, AssetType, Material, Texture, TextureFormat};
pub use codec::{Codec, Deflate, Identity};
pub use convert::{build_converters, EntityConverter, FlipX, FlipYZ, RotateX, ScaleConverter};
pub use entity::{Bounds, CacheFlags, Entity, EntityKind, EntityType, INVALID_ID};
pub use error::{DecodeError, EntityError, ImportError, SettingsError};
pub use info::{Constraint, ConstraintType, InstanceInfo, PropertyInfo};
pub use scene::{Scene, SceneDataFlags};
pub use sender::{SendHandle, SendSlot};
pub use settings::{ConversionSettings, Handedness, ImportSettings, SceneSettings, ZUpCorrection};

/// Scene library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
