//! Scene entities and their delta operators.
//!
//! Every entity carries a [`TransformData`] and one kind-specific payload.
//! Payloads implement [`Delta`]:
//!
//! - `strip` drops what is equal to a base so only changes go on the wire
//! - `merge` restores the dropped parts from the same base
//! - `diff` records what changed between two full entities
//! - `lerp` blends two entities of the same shape
//!
//! Floating point data compares with [`NearEqual`]; indices, ids and
//! material ids compare exactly.

mod camera;
mod curve;
mod light;
pub mod mesh;
mod points;
mod transform;

pub use camera::{CameraData, CameraFlags};
pub use curve::{CurveData, CurveFlags, SplineData};
pub use light::{LightData, LightFlags, LightType, ShadowType};
pub use mesh::{
    BlendShapeData, BlendShapeFrame, BoneData, MeshData, MeshFlags, MeshRefineSettings,
    RefineFlags, Weights1, Weights4,
};
pub use points::{PointsData, PointsFlags};
pub use transform::{TransformData, TransformFlags, Visibility};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use meshlink_core::math::{lerp, min_max, Lerp, Mat4, NearEqual, Quat, Vec3};
use meshlink_core::SharedVec;

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::{DecodeError, EntityError};

/// Id of an entity that has not been assigned one.
pub const INVALID_ID: i32 = -1;

/// Delta operations shared by the transform and every payload kind.
pub trait Delta {
    /// Marks or clears everything that matches `base`.
    fn strip(&mut self, base: &Self);

    /// Restores what [`strip`](Delta::strip) removed, taking it from `base`.
    fn merge(&mut self, base: &Self);

    /// Sets change flags from a comparison with `base`, keeping all values.
    fn diff(&mut self, base: &Self);

    /// `true` if `e1` and `e2` have the same shape.
    fn can_lerp(_e1: &Self, _e2: &Self) -> bool {
        true
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32);
}

/// Clears `attr` if it matches `base` within tolerance.
pub(crate) fn strip_if_near<T>(attr: &mut SharedVec<T>, base: &SharedVec<T>) -> bool
where
    T: Pod + NearEqual,
{
    let same = attr.near_equal(base);
    if same {
        attr.clear();
    }
    same
}

/// Clears `attr` if it is identical to `base`.
pub(crate) fn strip_if_equal<T: Pod + PartialEq>(
    attr: &mut SharedVec<T>,
    base: &SharedVec<T>,
) -> bool {
    let same = attr == base;
    if same {
        attr.clear();
    }
    same
}

/// Copies `src` into `dst` when `mask` contains `bit`.
pub(crate) fn assign_if_flagged<T: Pod, F: bitflags::Flags>(
    dst: &mut SharedVec<T>,
    src: &SharedVec<T>,
    mask: F,
    bit: F,
) {
    if mask.contains(bit) {
        *dst = src.clone();
    }
}

/// Element-wise lerp. Arrays of different length yield a copy of `a`.
pub(crate) fn lerp_array<T: Pod + Lerp>(a: &[T], b: &[T], t: f32) -> SharedVec<T> {
    if a.len() != b.len() {
        return SharedVec::from_vec(a.to_vec());
    }
    a.iter().zip(b).map(|(x, y)| lerp(x, y, t)).collect()
}

/// Axis-aligned box as center and half extents.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Bounds {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            center: Vec3::zeros(),
            extents: Vec3::zeros(),
        }
    }
}

impl Bounds {
    /// Tight bounds of `points`, or an empty box at the origin.
    pub fn from_points(points: &[Vec3]) -> Self {
        min_max(points)
            .map(|(lo, hi)| Self {
                center: (lo + hi) * 0.5,
                extents: (hi - lo) * 0.5,
            })
            .unwrap_or_default()
    }
}

/// Wire tag of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EntityType {
    Transform = 1,
    Camera = 2,
    Light = 3,
    Mesh = 4,
    Points = 5,
    Curve = 6,
}

impl EntityType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Transform),
            2 => Some(Self::Camera),
            3 => Some(Self::Light),
            4 => Some(Self::Mesh),
            5 => Some(Self::Points),
            6 => Some(Self::Curve),
            _ => None,
        }
    }

    /// Mesh, points and curves.
    pub fn is_geometry(self) -> bool {
        matches!(self, Self::Mesh | Self::Points | Self::Curve)
    }
}

/// Kind-specific payload of an entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EntityKind {
    #[default]
    Transform,
    Camera(CameraData),
    Light(LightData),
    Mesh(Box<MeshData>),
    Points(PointsData),
    Curve(CurveData),
}

impl EntityKind {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Transform => EntityType::Transform,
            Self::Camera(_) => EntityType::Camera,
            Self::Light(_) => EntityType::Light,
            Self::Mesh(_) => EntityType::Mesh,
            Self::Points(_) => EntityType::Points,
            Self::Curve(_) => EntityType::Curve,
        }
    }

    /// `true` if the payload itself was stripped to nothing.
    fn is_unchanged(&self) -> bool {
        match self {
            Self::Transform => true,
            Self::Camera(c) => c.is_unchanged(),
            Self::Light(l) => l.is_unchanged(),
            Self::Mesh(m) => m.is_unchanged(),
            Self::Points(p) => p.is_unchanged(),
            Self::Curve(c) => c.is_unchanged(),
        }
    }
}

bitflags! {
    /// Receiver-side hints. Never serialized.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CacheFlags: u32 {
        /// The entity never changes; delta operators leave it alone.
        const CONSTANT = 1 << 0;
        /// Geometry moves but its topology is fixed.
        const CONSTANT_TOPOLOGY = 1 << 1;
    }
}

/// A node of the scene hierarchy.
///
/// `path` is `/`-separated; an entity's parent is the entity whose path is
/// its path without the last component.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: i32,
    /// Id of the entity on the sending side, `-1` if not known.
    pub host_id: i32,
    pub path: String,
    pub transform: TransformData,
    pub kind: EntityKind,

    pub cache_flags: CacheFlags,
    /// Index of the parent in the owning scene, set by `build_hierarchy`.
    pub parent: Option<usize>,
    pub local_matrix: Mat4,
    pub world_matrix: Mat4,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            host_id: INVALID_ID,
            path: String::new(),
            transform: TransformData::default(),
            kind: EntityKind::Transform,
            cache_flags: CacheFlags::empty(),
            parent: None,
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
        }
    }
}

impl Entity {
    pub fn new(path: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            path: path.into(),
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_host_id(mut self, host_id: i32) -> Self {
        self.host_id = host_id;
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.transform.scale = scale;
        self
    }

    #[must_use]
    pub fn with_cache_flags(mut self, flags: CacheFlags) -> Self {
        self.cache_flags = flags;
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    pub fn is_geometry(&self) -> bool {
        self.entity_type().is_geometry()
    }

    pub fn is_constant(&self) -> bool {
        self.cache_flags.contains(CacheFlags::CONSTANT)
    }

    /// `true` for entities directly under the scene root, such as `/a`.
    pub fn is_root(&self) -> bool {
        self.path.rfind('/') == Some(0)
    }

    /// Path of the parent, `None` for root entities.
    pub fn parent_path(&self) -> Option<&str> {
        match self.path.rfind('/') {
            Some(pos) if pos > 0 => Some(&self.path[..pos]),
            _ => None,
        }
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// `true` if neither the transform nor the payload changed relative to
    /// the base it was stripped against or diffed with.
    pub fn is_unchanged(&self) -> bool {
        self.transform.is_unchanged() && self.kind.is_unchanged()
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            EntityKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut MeshData> {
        match &mut self.kind {
            EntityKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&PointsData> {
        match &self.kind {
            EntityKind::Points(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&CameraData> {
        match &self.kind {
            EntityKind::Camera(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&LightData> {
        match &self.kind {
            EntityKind::Light(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<&CurveData> {
        match &self.kind {
            EntityKind::Curve(c) => Some(c),
            _ => None,
        }
    }

    fn check_kind(&self, other: &Entity) -> Result<(), EntityError> {
        let (expected, actual) = (other.entity_type(), self.entity_type());
        if expected != actual {
            return Err(EntityError::KindMismatch {
                path: other.path.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Turns `self` into a delta against `base`.
    pub fn strip(&mut self, base: &Entity) -> Result<(), EntityError> {
        self.check_kind(base)?;
        if self.path == base.path {
            self.path.clear();
        }
        self.transform.strip(&base.transform);
        match (&mut self.kind, &base.kind) {
            (EntityKind::Camera(a), EntityKind::Camera(b)) => a.strip(b),
            (EntityKind::Light(a), EntityKind::Light(b)) => a.strip(b),
            (EntityKind::Mesh(a), EntityKind::Mesh(b)) => a.strip(b),
            (EntityKind::Points(a), EntityKind::Points(b)) => a.strip(b),
            (EntityKind::Curve(a), EntityKind::Curve(b)) => a.strip(b),
            _ => {}
        }
        Ok(())
    }

    /// Rebuilds a full entity from a delta produced by [`strip`](Self::strip)
    /// against the same `base`. Constant entities are left alone.
    pub fn merge(&mut self, base: &Entity) -> Result<(), EntityError> {
        self.check_kind(base)?;
        if self.is_constant() {
            return Ok(());
        }
        if self.path.is_empty() {
            self.path = base.path.clone();
        }
        self.transform.merge(&base.transform);
        match (&mut self.kind, &base.kind) {
            (EntityKind::Camera(a), EntityKind::Camera(b)) => a.merge(b),
            (EntityKind::Light(a), EntityKind::Light(b)) => a.merge(b),
            (EntityKind::Mesh(a), EntityKind::Mesh(b)) => a.merge(b),
            (EntityKind::Points(a), EntityKind::Points(b)) => a.merge(b),
            (EntityKind::Curve(a), EntityKind::Curve(b)) => a.merge(b),
            _ => {}
        }
        Ok(())
    }

    /// `e2` with change flags describing how it differs from `e1`.
    pub fn diff(e1: &Entity, e2: &Entity) -> Result<Entity, EntityError> {
        e2.check_kind(e1)?;
        let mut out = e2.clone();
        out.transform.diff(&e1.transform);
        match (&mut out.kind, &e1.kind) {
            (EntityKind::Camera(a), EntityKind::Camera(b)) => a.diff(b),
            (EntityKind::Light(a), EntityKind::Light(b)) => a.diff(b),
            (EntityKind::Mesh(a), EntityKind::Mesh(b)) => a.diff(b),
            (EntityKind::Points(a), EntityKind::Points(b)) => a.diff(b),
            (EntityKind::Curve(a), EntityKind::Curve(b)) => a.diff(b),
            _ => {}
        }
        Ok(out)
    }

    /// `true` if `e1` and `e2` can be blended.
    pub fn can_lerp(e1: &Entity, e2: &Entity) -> bool {
        match (&e1.kind, &e2.kind) {
            (EntityKind::Transform, EntityKind::Transform) => true,
            (EntityKind::Camera(a), EntityKind::Camera(b)) => CameraData::can_lerp(a, b),
            (EntityKind::Light(a), EntityKind::Light(b)) => LightData::can_lerp(a, b),
            (EntityKind::Mesh(a), EntityKind::Mesh(b)) => MeshData::can_lerp(a, b),
            (EntityKind::Points(a), EntityKind::Points(b)) => PointsData::can_lerp(a, b),
            (EntityKind::Curve(a), EntityKind::Curve(b)) => CurveData::can_lerp(a, b),
            _ => false,
        }
    }

    /// Blends `e1` and `e2` into `self`. Returns `false`, leaving `self`
    /// untouched, when `self` is constant or the inputs differ in kind or
    /// shape.
    pub fn lerp(&mut self, e1: &Entity, e2: &Entity, t: f32) -> bool {
        if self.is_constant() || !Self::can_lerp(e1, e2) || self.entity_type() != e1.entity_type()
        {
            return false;
        }
        self.transform.lerp(&e1.transform, &e2.transform, t);
        match (&mut self.kind, &e1.kind, &e2.kind) {
            (EntityKind::Camera(d), EntityKind::Camera(a), EntityKind::Camera(b)) => d.lerp(a, b, t),
            (EntityKind::Light(d), EntityKind::Light(a), EntityKind::Light(b)) => d.lerp(a, b, t),
            (EntityKind::Mesh(d), EntityKind::Mesh(a), EntityKind::Mesh(b)) => d.lerp(a, b, t),
            (EntityKind::Points(d), EntityKind::Points(a), EntityKind::Points(b)) => {
                d.lerp(a, b, t)
            }
            (EntityKind::Curve(d), EntityKind::Curve(a), EntityKind::Curve(b)) => d.lerp(a, b, t),
            _ => {}
        }
        true
    }

    /// Recomputes the bounds of mesh and points payloads.
    pub fn update_bounds(&mut self) {
        match &mut self.kind {
            EntityKind::Mesh(m) => m.update_bounds(),
            EntityKind::Points(p) => p.update_bounds(),
            _ => {}
        }
    }
}

impl Encode for Entity {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.entity_type() as u32);
        w.write_i32(self.id);
        w.write_i32(self.host_id);
        w.write_str(&self.path);
        self.transform.encode(w);
        match &self.kind {
            EntityKind::Transform => {}
            EntityKind::Camera(c) => c.encode(w),
            EntityKind::Light(l) => l.encode(w),
            EntityKind::Mesh(m) => m.encode(w),
            EntityKind::Points(p) => p.encode(w),
            EntityKind::Curve(c) => c.encode(w),
        }
    }
}

impl Decode for Entity {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let tag = r.read_u32()?;
        let entity_type = EntityType::from_u32(tag).ok_or(DecodeError::UnknownEntityType(tag))?;
        let id = r.read_i32()?;
        let host_id = r.read_i32()?;
        let path = r.read_string()?;
        let transform = TransformData::decode(r)?;
        let kind = match entity_type {
            EntityType::Transform => EntityKind::Transform,
            EntityType::Camera => EntityKind::Camera(CameraData::decode(r)?),
            EntityType::Light => EntityKind::Light(LightData::decode(r)?),
            EntityType::Mesh => EntityKind::Mesh(Box::new(MeshData::decode(r)?)),
            EntityType::Points => EntityKind::Points(PointsData::decode(r)?),
            EntityType::Curve => EntityKind::Curve(CurveData::decode(r)?),
        };
        Ok(Self {
            id,
            host_id,
            path,
            transform,
            kind,
            ..Self::default()
        })
    }
}
