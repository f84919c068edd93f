//! Keyframe animation attached to entity paths.
//!
//! An [`AnimationClip`] holds one [`Animation`] per animated entity. Each
//! animation is a name-sorted list of [`AnimationCurve`]s whose names follow
//! the `Kind.property` convention of the constants below. Curve flags tell
//! the coordinate converters which channels are spatial.

use bitflags::bitflags;
use bytemuck::Pod;
use meshlink_core::math::{NearEqual, Quat, Vec2, Vec3, Vec4};

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::entity::EntityType;
use crate::error::DecodeError;

pub const TRANSFORM_TRANSLATION: &str = "Transform.translation";
pub const TRANSFORM_ROTATION: &str = "Transform.rotation";
pub const TRANSFORM_SCALE: &str = "Transform.scale";
pub const TRANSFORM_VISIBLE: &str = "Transform.visible";

pub const CAMERA_FOV: &str = "Camera.fieldOfView";
pub const CAMERA_NEAR_PLANE: &str = "Camera.nearPlane";
pub const CAMERA_FAR_PLANE: &str = "Camera.farPlane";
pub const CAMERA_FOCAL_LENGTH: &str = "Camera.focalLength";
pub const CAMERA_SENSOR_SIZE: &str = "Camera.sensorSize";
pub const CAMERA_LENS_SHIFT: &str = "Camera.lensShift";

pub const LIGHT_COLOR: &str = "Light.color";
pub const LIGHT_INTENSITY: &str = "Light.intensity";
pub const LIGHT_RANGE: &str = "Light.range";
pub const LIGHT_SPOT_ANGLE: &str = "Light.spotAngle";

/// Prefix of per-blendshape weight curves, `Mesh.blendShape.<name>`.
pub const MESH_BLENDSHAPE: &str = "Mesh.blendShape";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelFlags: u32 {
        /// Values are lengths or positions and follow the scene scale.
        const AFFECT_SCALE = 1 << 0;
        /// Values are spatial and follow axis flips.
        const AFFECT_HANDEDNESS = 1 << 1;
        /// Values are magnitudes per axis (scale); axes are permuted, never negated.
        const IGNORE_NEGATE = 1 << 2;
        /// Step interpolation, e.g. visibility.
        const FORCE_CONSTANT = 1 << 3;
    }
}

impl ChannelFlags {
    /// Flags of a well-known channel, empty for anything else.
    pub fn for_channel(name: &str) -> Self {
        match name {
            TRANSFORM_TRANSLATION => Self::AFFECT_SCALE | Self::AFFECT_HANDEDNESS,
            TRANSFORM_ROTATION => Self::AFFECT_HANDEDNESS,
            TRANSFORM_SCALE => Self::AFFECT_HANDEDNESS | Self::IGNORE_NEGATE,
            TRANSFORM_VISIBLE => Self::FORCE_CONSTANT,
            CAMERA_NEAR_PLANE | CAMERA_FAR_PLANE | LIGHT_RANGE => Self::AFFECT_SCALE,
            _ => Self::empty(),
        }
    }
}

/// One time/value sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Key<T> {
    pub time: f32,
    pub value: T,
}

impl<T> Key<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Typed keyframe storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyframes {
    Int(Vec<Key<i32>>),
    Float(Vec<Key<f32>>),
    Float2(Vec<Key<Vec2>>),
    Float3(Vec<Key<Vec3>>),
    Float4(Vec<Key<Vec4>>),
    Quaternion(Vec<Key<Quat>>),
}

impl Keyframes {
    fn tag(&self) -> u32 {
        match self {
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Float2(_) => 3,
            Self::Float3(_) => 4,
            Self::Float4(_) => 5,
            Self::Quaternion(_) => 6,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int(k) => k.len(),
            Self::Float(k) => k.len(),
            Self::Float2(k) => k.len(),
            Self::Float3(k) => k.len(),
            Self::Float4(k) => k.len(),
            Self::Quaternion(k) => k.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops trailing keys equal to their predecessor.
///
/// A curve that collapses to a single key is either cleared or, with
/// `keep_flat`, kept as two keys (first value, original last time).
fn reduce<T: Copy>(keys: &mut Vec<Key<T>>, keep_flat: bool, eq: impl Fn(&T, &T) -> bool) {
    let Some(&last) = keys.last() else {
        return;
    };
    if keys.len() == 1 {
        return;
    }
    while keys.len() >= 2 && eq(&keys[keys.len() - 2].value, &keys[keys.len() - 1].value) {
        keys.pop();
    }
    if keys.len() == 1 {
        if keep_flat {
            keys.push(last);
        } else {
            keys.clear();
        }
    }
}

fn write_keys<T: Pod>(w: &mut Writer, keys: &[Key<T>]) {
    w.write_u32(keys.len() as u32);
    for k in keys {
        w.write_f32(k.time);
        w.write_pod(&k.value);
    }
}

fn read_keys<T: Pod>(r: &mut Reader) -> Result<Vec<Key<T>>, DecodeError> {
    let n = r.read_u32()? as usize;
    let mut keys = Vec::with_capacity(n.min(r.remaining() / 4));
    for _ in 0..n {
        let time = r.read_f32()?;
        keys.push(Key::new(time, r.read_pod()?));
    }
    Ok(keys)
}

/// A named, typed channel of an [`Animation`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationCurve {
    pub name: String,
    pub flags: ChannelFlags,
    pub keys: Keyframes,
}

impl AnimationCurve {
    /// Creates a curve with the flags of its channel name.
    pub fn new(name: impl Into<String>, keys: Keyframes) -> Self {
        let name = name.into();
        Self {
            flags: ChannelFlags::for_channel(&name),
            name,
            keys,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Removes redundant trailing keys.
    pub fn reduce_keyframes(&mut self, keep_flat: bool) {
        match &mut self.keys {
            Keyframes::Int(k) => reduce(k, keep_flat, |a, b| a == b),
            Keyframes::Float(k) => reduce(k, keep_flat, |a, b| a.near_equal(b)),
            Keyframes::Float2(k) => reduce(k, keep_flat, |a, b| a.near_equal(b)),
            Keyframes::Float3(k) => reduce(k, keep_flat, |a, b| a.near_equal(b)),
            Keyframes::Float4(k) => reduce(k, keep_flat, |a, b| a.near_equal(b)),
            Keyframes::Quaternion(k) => reduce(k, keep_flat, |a, b| a.near_equal(b)),
        }
    }
}

impl Encode for AnimationCurve {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.name);
        w.write_u32(self.flags.bits());
        w.write_u32(self.keys.tag());
        match &self.keys {
            Keyframes::Int(k) => write_keys(w, k),
            Keyframes::Float(k) => write_keys(w, k),
            Keyframes::Float2(k) => write_keys(w, k),
            Keyframes::Float3(k) => write_keys(w, k),
            Keyframes::Float4(k) => write_keys(w, k),
            Keyframes::Quaternion(k) => write_keys(w, k),
        }
    }
}

impl Decode for AnimationCurve {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let name = r.read_string()?;
        let flags = ChannelFlags::from_bits_truncate(r.read_u32()?);
        let keys = match r.read_u32()? {
            1 => Keyframes::Int(read_keys(r)?),
            2 => Keyframes::Float(read_keys(r)?),
            3 => Keyframes::Float2(read_keys(r)?),
            4 => Keyframes::Float3(read_keys(r)?),
            5 => Keyframes::Float4(read_keys(r)?),
            6 => Keyframes::Quaternion(read_keys(r)?),
            value => {
                return Err(DecodeError::UnknownEnum {
                    name: "Keyframes",
                    value,
                })
            }
        };
        Ok(Self { name, flags, keys })
    }
}

/// All animated channels of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub entity_type: EntityType,
    pub path: String,
    /// Sorted by name.
    pub curves: Vec<AnimationCurve>,
}

impl Animation {
    pub fn new(entity_type: EntityType, path: impl Into<String>) -> Self {
        Self {
            entity_type,
            path: path.into(),
            curves: Vec::new(),
        }
    }

    /// `true` if every curve is empty.
    pub fn is_empty(&self) -> bool {
        self.curves.iter().all(AnimationCurve::is_empty)
    }

    /// Same rule as [`Entity::is_root`](crate::Entity::is_root).
    pub fn is_root(&self) -> bool {
        self.path.rfind('/') == Some(0)
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.curves.binary_search_by(|c| c.name.as_str().cmp(name))
    }

    pub fn find_curve(&self, name: &str) -> Option<&AnimationCurve> {
        self.position(name).ok().map(|i| &self.curves[i])
    }

    pub fn find_curve_mut(&mut self, name: &str) -> Option<&mut AnimationCurve> {
        self.position(name).ok().map(move |i| &mut self.curves[i])
    }

    /// Inserts `curve`, replacing a curve of the same name.
    pub fn add_curve(&mut self, curve: AnimationCurve) -> &mut AnimationCurve {
        let i = match self.position(&curve.name) {
            Ok(i) => {
                self.curves[i] = curve;
                i
            }
            Err(i) => {
                self.curves.insert(i, curve);
                i
            }
        };
        &mut self.curves[i]
    }

    pub fn remove_curve(&mut self, name: &str) -> Option<AnimationCurve> {
        self.position(name).ok().map(|i| self.curves.remove(i))
    }

    /// Weight curves of blendshapes, in name order.
    pub fn blendshape_curves(&self) -> impl Iterator<Item = &AnimationCurve> {
        let start = self.curves.partition_point(|c| c.name.as_str() < MESH_BLENDSHAPE);
        self.curves[start..]
            .iter()
            .take_while(|c| c.name.starts_with(MESH_BLENDSHAPE))
    }

    pub fn clear_empty_curves(&mut self) {
        self.curves.retain(|c| !c.is_empty());
    }

    /// Drops channels that carry no information: empty curves and a
    /// visibility curve that never changes.
    pub fn validate(&mut self) {
        let constant_visibility = self.find_curve(TRANSFORM_VISIBLE).is_some_and(|c| {
            matches!(&c.keys, Keyframes::Int(k) if k.windows(2).all(|w| w[0].value == w[1].value))
        });
        if constant_visibility {
            self.remove_curve(TRANSFORM_VISIBLE);
        }
        self.clear_empty_curves();
    }

    pub fn reduce_keyframes(&mut self, keep_flat: bool) {
        for curve in &mut self.curves {
            curve.reduce_keyframes(keep_flat);
        }
    }
}

impl Encode for Animation {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.entity_type as u32);
        w.write_str(&self.path);
        w.write_seq(&self.curves);
    }
}

impl Decode for Animation {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let tag = r.read_u32()?;
        let entity_type = EntityType::from_u32(tag).ok_or(DecodeError::UnknownEntityType(tag))?;
        let path = r.read_string()?;
        let mut curves: Vec<AnimationCurve> = r.read_seq()?;
        curves.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            entity_type,
            path,
            curves,
        })
    }
}

/// Animation asset: one [`Animation`] per target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub id: i32,
    pub name: String,
    pub frame_rate: f32,
    pub animations: Vec<Animation>,
}

impl Default for AnimationClip {
    fn default() -> Self {
        Self {
            id: crate::entity::INVALID_ID,
            name: String::new(),
            frame_rate: 30.0,
            animations: Vec::new(),
        }
    }
}

impl AnimationClip {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn clear_empty_animations(&mut self) {
        self.animations.retain(|a| !a.is_empty());
    }

    /// Reduces every curve, then drops animations left without keys.
    pub fn reduce_keyframes(&mut self, keep_flat: bool) {
        for anim in &mut self.animations {
            anim.reduce_keyframes(keep_flat);
            anim.clear_empty_curves();
        }
        self.clear_empty_animations();
    }
}

impl Encode for AnimationClip {
    fn encode(&self, w: &mut Writer) {
        w.write_i32(self.id);
        w.write_str(&self.name);
        w.write_f32(self.frame_rate);
        w.write_seq(&self.animations);
    }
}

impl Decode for AnimationClip {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            id: r.read_i32()?,
            name: r.read_string()?,
            frame_rate: r.read_f32()?,
            animations: r.read_seq()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn float_curve(name: &str, values: &[f32]) -> AnimationCurve {
        let keys = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Key::new(i as f32, v))
            .collect();
        AnimationCurve::new(name, Keyframes::Float(keys))
    }

    #[test]
    fn well_known_channels_get_flags() {
        let t = AnimationCurve::new(TRANSFORM_TRANSLATION, Keyframes::Float3(vec![]));
        assert!(t.flags.contains(ChannelFlags::AFFECT_SCALE | ChannelFlags::AFFECT_HANDEDNESS));
        let s = AnimationCurve::new(TRANSFORM_SCALE, Keyframes::Float3(vec![]));
        assert!(s.flags.contains(ChannelFlags::IGNORE_NEGATE));
        assert!(ChannelFlags::for_channel("Custom.thing").is_empty());
    }

    #[test]
    fn reduce_drops_trailing_duplicates() {
        let mut c = float_curve(CAMERA_FOV, &[1.0, 2.0, 2.0, 2.0]);
        c.reduce_keyframes(false);
        let Keyframes::Float(keys) = &c.keys else {
            panic!("type changed");
        };
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1], Key::new(1.0, 2.0));
    }

    #[test]
    fn flat_curve_is_cleared_or_kept_as_two_keys() {
        let mut c = float_curve(CAMERA_FOV, &[5.0, 5.0, 5.0]);
        let mut cleared = c.clone();
        cleared.reduce_keyframes(false);
        assert!(cleared.is_empty());

        c.reduce_keyframes(true);
        let Keyframes::Float(keys) = &c.keys else {
            panic!("type changed");
        };
        assert_eq!(keys, &vec![Key::new(0.0, 5.0), Key::new(2.0, 5.0)]);
    }

    #[test]
    fn curves_stay_sorted() {
        let mut anim = Animation::new(EntityType::Mesh, "/body");
        anim.add_curve(float_curve("Mesh.blendShape.smile", &[0.0]));
        anim.add_curve(float_curve(TRANSFORM_VISIBLE, &[]));
        anim.add_curve(float_curve("Mesh.blendShape.blink", &[0.0, 1.0]));
        anim.add_curve(float_curve(CAMERA_FOV, &[1.0]));

        let names: Vec<_> = anim.curves.iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);

        let shapes: Vec<_> = anim.blendshape_curves().map(|c| c.name.as_str()).collect();
        assert_eq!(shapes, ["Mesh.blendShape.blink", "Mesh.blendShape.smile"]);

        anim.add_curve(float_curve("Mesh.blendShape.blink", &[]));
        assert_eq!(anim.curves.len(), 4);
        anim.clear_empty_curves();
        assert_eq!(anim.curves.len(), 2);
    }

    #[test]
    fn validate_drops_constant_visibility() {
        let mut anim = Animation::new(EntityType::Transform, "/a");
        anim.add_curve(AnimationCurve::new(
            TRANSFORM_VISIBLE,
            Keyframes::Int(vec![Key::new(0.0, 1), Key::new(1.0, 1)]),
        ));
        anim.validate();
        assert!(anim.find_curve(TRANSFORM_VISIBLE).is_none());
    }

    #[test]
    fn clip_survives_the_wire() {
        let mut anim = Animation::new(EntityType::Light, "/sun");
        anim.add_curve(AnimationCurve::new(
            TRANSFORM_ROTATION,
            Keyframes::Quaternion(vec![Key::new(0.0, Quat::identity())]),
        ));
        anim.add_curve(float_curve(LIGHT_INTENSITY, &[1.0, 0.5]));
        let mut clip = AnimationClip::new(7, "take");
        clip.animations.push(anim);

        let mut w = Writer::new();
        clip.encode(&mut w);
        let back = AnimationClip::decode(&mut Reader::new(Arc::from(w.into_bytes()))).unwrap();
        assert_eq!(back, clip);
    }
}
