//! Transform component shared by every entity kind.

use bitflags::bitflags;
use meshlink_core::math::{
    lerp, mat4_from_scale_rotation_translation, slerp, to_scale_rotation_translation, Mat4,
    NearEqual, Quat, Vec3,
};

use super::Delta;
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

bitflags! {
    /// Change and presence flags of a [`TransformData`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransformFlags: u32 {
        /// Equal to the base the delta was stripped against.
        const UNCHANGED = 1 << 0;
        const HAS_POSITION = 1 << 1;
        const HAS_ROTATION = 1 << 2;
        const HAS_SCALE = 1 << 3;
        const HAS_VISIBILITY = 1 << 4;
        const HAS_LAYER = 1 << 5;
        const HAS_INDEX = 1 << 6;
        const HAS_REFERENCE = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Visibility: u32 {
        const ACTIVE = 1 << 0;
        const VISIBLE_IN_RENDER = 1 << 1;
        const VISIBLE_IN_VIEWPORT = 1 << 2;
        const CAST_SHADOWS = 1 << 3;
        const RECEIVE_SHADOWS = 1 << 4;
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::all()
    }
}

/// Local transform, visibility and instancing reference of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformData {
    pub flags: TransformFlags,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visibility: Visibility,
    pub layer: i32,
    /// Sibling order.
    pub index: i32,
    /// Path of the entity this one instances, empty if none.
    pub reference: String,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            flags: TransformFlags::empty(),
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::repeat(1.0),
            visibility: Visibility::default(),
            layer: 0,
            index: 0,
            reference: String::new(),
        }
    }
}

impl TransformData {
    pub fn is_unchanged(&self) -> bool {
        self.flags.contains(TransformFlags::UNCHANGED)
    }

    /// Local matrix built as translation * rotation * scale.
    pub fn local_matrix(&self) -> Mat4 {
        mat4_from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Decomposes `m` into position, rotation and scale.
    pub fn assign_matrix(&mut self, m: &Mat4) {
        let (scale, rotation, position) = to_scale_rotation_translation(m);
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
    }

    fn values_near_equal(&self, other: &Self) -> bool {
        self.position.near_equal(&other.position)
            && self.rotation.near_equal(&other.rotation)
            && self.scale.near_equal(&other.scale)
            && self.visibility == other.visibility
            && self.layer == other.layer
            && self.index == other.index
            && self.reference == other.reference
    }

    fn assign_values(&mut self, other: &Self) {
        let flags = self.flags;
        *self = other.clone();
        self.flags = flags;
    }

    fn wire_flags(&self) -> TransformFlags {
        if self.is_unchanged() {
            return TransformFlags::UNCHANGED;
        }
        let mut flags = TransformFlags::HAS_POSITION
            | TransformFlags::HAS_ROTATION
            | TransformFlags::HAS_SCALE
            | TransformFlags::HAS_VISIBILITY;
        flags.set(TransformFlags::HAS_LAYER, self.layer != 0);
        flags.set(TransformFlags::HAS_INDEX, self.index != 0);
        flags.set(TransformFlags::HAS_REFERENCE, !self.reference.is_empty());
        flags
    }
}

impl Delta for TransformData {
    fn strip(&mut self, base: &Self) {
        let same = self.values_near_equal(base);
        self.flags.set(TransformFlags::UNCHANGED, same);
    }

    fn merge(&mut self, base: &Self) {
        if self.is_unchanged() {
            self.assign_values(base);
        }
    }

    fn diff(&mut self, base: &Self) {
        let same = self.values_near_equal(base);
        self.flags.set(TransformFlags::UNCHANGED, same);
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32) {
        self.position = lerp(&e1.position, &e2.position, t);
        self.rotation = slerp(&e1.rotation, &e2.rotation, t);
        self.scale = lerp(&e1.scale, &e2.scale, t);
    }
}

impl Encode for TransformData {
    fn encode(&self, w: &mut Writer) {
        let flags = self.wire_flags();
        w.write_u32(flags.bits());
        if flags.contains(TransformFlags::UNCHANGED) {
            return;
        }
        w.write_pod(&self.position);
        w.write_pod(&self.rotation);
        w.write_pod(&self.scale);
        w.write_u32(self.visibility.bits());
        if flags.contains(TransformFlags::HAS_LAYER) {
            w.write_i32(self.layer);
        }
        if flags.contains(TransformFlags::HAS_INDEX) {
            w.write_i32(self.index);
        }
        if flags.contains(TransformFlags::HAS_REFERENCE) {
            w.write_str(&self.reference);
        }
    }
}

impl Decode for TransformData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = TransformFlags::from_bits_truncate(r.read_u32()?);
        let mut data = Self {
            flags: flags & TransformFlags::UNCHANGED,
            ..Self::default()
        };
        if data.is_unchanged() {
            return Ok(data);
        }
        if flags.contains(TransformFlags::HAS_POSITION) {
            data.position = r.read_pod()?;
        }
        if flags.contains(TransformFlags::HAS_ROTATION) {
            data.rotation = r.read_pod()?;
        }
        if flags.contains(TransformFlags::HAS_SCALE) {
            data.scale = r.read_pod()?;
        }
        if flags.contains(TransformFlags::HAS_VISIBILITY) {
            data.visibility = Visibility::from_bits_truncate(r.read_u32()?);
        }
        if flags.contains(TransformFlags::HAS_LAYER) {
            data.layer = r.read_i32()?;
        }
        if flags.contains(TransformFlags::HAS_INDEX) {
            data.index = r.read_i32()?;
        }
        if flags.contains(TransformFlags::HAS_REFERENCE) {
            data.reference = r.read_string()?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_core::math::quat_from_rotation_y;
    use std::sync::Arc;

    fn moved(x: f32) -> TransformData {
        TransformData {
            position: Vec3::new(x, 0.0, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn strip_marks_tiny_changes_unchanged() {
        let mut a = moved(1.0 + 1e-6);
        a.strip(&moved(1.0));
        assert!(a.is_unchanged());

        let mut b = moved(1.1);
        b.strip(&moved(1.0));
        assert!(!b.is_unchanged());
    }

    #[test]
    fn merge_restores_stripped_values() {
        let base = TransformData {
            rotation: quat_from_rotation_y(0.5),
            reference: "/a".into(),
            ..moved(2.0)
        };
        let mut delta = base.clone();
        delta.strip(&base);

        let mut w = Writer::new();
        delta.encode(&mut w);
        assert_eq!(w.len(), 4);

        let mut decoded = TransformData::decode(&mut Reader::new(Arc::from(w.into_bytes()))).unwrap();
        decoded.merge(&base);
        assert_eq!(decoded.position, base.position);
        assert_eq!(decoded.rotation, base.rotation);
        assert_eq!(decoded.reference, "/a");
    }

    #[test]
    fn optional_fields_round_trip() {
        let data = TransformData {
            layer: 3,
            reference: "/proto".into(),
            visibility: Visibility::ACTIVE,
            ..moved(4.0)
        };
        let mut w = Writer::new();
        data.encode(&mut w);
        let decoded = TransformData::decode(&mut Reader::new(Arc::from(w.into_bytes()))).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn lerp_midpoint() {
        let mut out = TransformData::default();
        out.lerp(&moved(0.0), &moved(2.0), 0.5);
        assert!(out.position.near_equal(&Vec3::new(1.0, 0.0, 0.0)));
        assert!(out.rotation.near_equal(&Quat::identity()));
    }
}
