use bitflags::bitflags;
use meshlink_core::math::{slerp, Quat, Vec3, Vec4};
use meshlink_core::SharedVec;

use super::{assign_if_flagged, lerp_array, strip_if_equal, strip_if_near, Bounds, Delta};
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PointsFlags: u32 {
        const UNCHANGED = 1 << 0;
        /// Same point count and ids as the base.
        const TOPOLOGY_UNCHANGED = 1 << 1;
        const HAS_POINTS = 1 << 2;
        const HAS_ROTATIONS = 1 << 3;
        const HAS_SCALES = 1 << 4;
        const HAS_COLORS = 1 << 5;
        const HAS_VELOCITIES = 1 << 6;
        const HAS_IDS = 1 << 7;
        const HAS_BOUNDS = 1 << 8;

        const ATTRIBUTES = Self::HAS_POINTS.bits()
            | Self::HAS_ROTATIONS.bits()
            | Self::HAS_SCALES.bits()
            | Self::HAS_COLORS.bits()
            | Self::HAS_VELOCITIES.bits()
            | Self::HAS_IDS.bits();
    }
}

/// Point cloud / particle data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointsData {
    pub flags: PointsFlags,
    /// Attributes that were removed by `strip` because they matched the base.
    pub stripped: PointsFlags,
    pub points: SharedVec<Vec3>,
    pub rotations: SharedVec<Quat>,
    pub scales: SharedVec<Vec3>,
    pub colors: SharedVec<Vec4>,
    pub velocities: SharedVec<Vec3>,
    pub ids: SharedVec<i32>,
    pub bounds: Bounds,
}

impl PointsData {
    pub fn is_unchanged(&self) -> bool {
        self.flags.contains(PointsFlags::UNCHANGED)
    }

    pub fn is_topology_unchanged(&self) -> bool {
        self.flags.contains(PointsFlags::TOPOLOGY_UNCHANGED)
    }

    pub fn update_bounds(&mut self) {
        self.bounds = Bounds::from_points(&self.points);
    }

    fn compare(&self, base: &Self) -> PointsFlags {
        use meshlink_core::math::NearEqual;
        let mut same = PointsFlags::empty();
        same.set(PointsFlags::HAS_POINTS, self.points.near_equal(&base.points));
        same.set(
            PointsFlags::HAS_ROTATIONS,
            self.rotations.near_equal(&base.rotations),
        );
        same.set(PointsFlags::HAS_SCALES, self.scales.near_equal(&base.scales));
        same.set(PointsFlags::HAS_COLORS, self.colors.near_equal(&base.colors));
        same.set(
            PointsFlags::HAS_VELOCITIES,
            self.velocities.near_equal(&base.velocities),
        );
        same.set(PointsFlags::HAS_IDS, self.ids == base.ids);
        same
    }

    fn set_change_flags(&mut self, base: &Self, same: PointsFlags) {
        self.flags.set(
            PointsFlags::TOPOLOGY_UNCHANGED,
            same.contains(PointsFlags::HAS_IDS) && self.points.len() == base.points.len(),
        );
        self.flags.set(
            PointsFlags::UNCHANGED,
            same.contains(PointsFlags::ATTRIBUTES),
        );
    }

    fn wire_flags(&self) -> PointsFlags {
        if self.is_unchanged() {
            return PointsFlags::UNCHANGED;
        }
        let mut flags = self.flags & PointsFlags::TOPOLOGY_UNCHANGED;
        flags.set(PointsFlags::HAS_POINTS, !self.points.is_empty());
        flags.set(PointsFlags::HAS_ROTATIONS, !self.rotations.is_empty());
        flags.set(PointsFlags::HAS_SCALES, !self.scales.is_empty());
        flags.set(PointsFlags::HAS_COLORS, !self.colors.is_empty());
        flags.set(PointsFlags::HAS_VELOCITIES, !self.velocities.is_empty());
        flags.set(PointsFlags::HAS_IDS, !self.ids.is_empty());
        flags | PointsFlags::HAS_BOUNDS
    }
}

impl Delta for PointsData {
    fn strip(&mut self, base: &Self) {
        let mut same = PointsFlags::empty();
        same.set(
            PointsFlags::HAS_POINTS,
            strip_if_near(&mut self.points, &base.points),
        );
        same.set(
            PointsFlags::HAS_ROTATIONS,
            strip_if_near(&mut self.rotations, &base.rotations),
        );
        same.set(
            PointsFlags::HAS_SCALES,
            strip_if_near(&mut self.scales, &base.scales),
        );
        same.set(
            PointsFlags::HAS_COLORS,
            strip_if_near(&mut self.colors, &base.colors),
        );
        same.set(
            PointsFlags::HAS_VELOCITIES,
            strip_if_near(&mut self.velocities, &base.velocities),
        );
        let point_count_same = same.contains(PointsFlags::HAS_POINTS)
            || self.points.len() == base.points.len();
        same.set(PointsFlags::HAS_IDS, strip_if_equal(&mut self.ids, &base.ids));

        self.stripped = same;
        self.flags.set(
            PointsFlags::TOPOLOGY_UNCHANGED,
            same.contains(PointsFlags::HAS_IDS) && point_count_same,
        );
        self.flags.set(
            PointsFlags::UNCHANGED,
            same.contains(PointsFlags::ATTRIBUTES),
        );
    }

    fn merge(&mut self, base: &Self) {
        let restore = if self.is_unchanged() {
            PointsFlags::ATTRIBUTES
        } else {
            self.stripped
        };
        assign_if_flagged(&mut self.points, &base.points, restore, PointsFlags::HAS_POINTS);
        assign_if_flagged(
            &mut self.rotations,
            &base.rotations,
            restore,
            PointsFlags::HAS_ROTATIONS,
        );
        assign_if_flagged(&mut self.scales, &base.scales, restore, PointsFlags::HAS_SCALES);
        assign_if_flagged(&mut self.colors, &base.colors, restore, PointsFlags::HAS_COLORS);
        assign_if_flagged(
            &mut self.velocities,
            &base.velocities,
            restore,
            PointsFlags::HAS_VELOCITIES,
        );
        assign_if_flagged(&mut self.ids, &base.ids, restore, PointsFlags::HAS_IDS);
        if self.is_unchanged() {
            self.bounds = base.bounds;
        }
        self.stripped = PointsFlags::empty();
    }

    fn diff(&mut self, base: &Self) {
        let same = self.compare(base);
        self.set_change_flags(base, same);
    }

    fn can_lerp(e1: &Self, e2: &Self) -> bool {
        e1.points.len() == e2.points.len() && e1.ids == e2.ids
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32) {
        self.points = lerp_array(&e1.points, &e2.points, t);
        self.rotations = if e1.rotations.len() == e2.rotations.len() {
            e1.rotations
                .iter()
                .zip(e2.rotations.iter())
                .map(|(a, b)| slerp(a, b, t))
                .collect()
        } else {
            e1.rotations.clone()
        };
        self.scales = lerp_array(&e1.scales, &e2.scales, t);
        self.colors = lerp_array(&e1.colors, &e2.colors, t);
        self.velocities = lerp_array(&e1.velocities, &e2.velocities, t);
        self.ids = e1.ids.clone();
        self.update_bounds();
    }
}

impl Encode for PointsData {
    fn encode(&self, w: &mut Writer) {
        let flags = self.wire_flags();
        w.write_u32(flags.bits());
        if flags.contains(PointsFlags::UNCHANGED) {
            return;
        }
        w.write_u32(self.stripped.bits());
        if flags.contains(PointsFlags::HAS_POINTS) {
            w.write_slice(&self.points);
        }
        if flags.contains(PointsFlags::HAS_ROTATIONS) {
            w.write_slice(&self.rotations);
        }
        if flags.contains(PointsFlags::HAS_SCALES) {
            w.write_slice(&self.scales);
        }
        if flags.contains(PointsFlags::HAS_COLORS) {
            w.write_slice(&self.colors);
        }
        if flags.contains(PointsFlags::HAS_VELOCITIES) {
            w.write_slice(&self.velocities);
        }
        if flags.contains(PointsFlags::HAS_IDS) {
            w.write_slice(&self.ids);
        }
        w.write_pod(&self.bounds);
    }
}

impl Decode for PointsData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = PointsFlags::from_bits_truncate(r.read_u32()?);
        let mut data = Self {
            flags: flags & (PointsFlags::UNCHANGED | PointsFlags::TOPOLOGY_UNCHANGED),
            ..Self::default()
        };
        if data.is_unchanged() {
            return Ok(data);
        }
        data.stripped = PointsFlags::from_bits_truncate(r.read_u32()?);
        if flags.contains(PointsFlags::HAS_POINTS) {
            data.points = r.read_shared()?;
        }
        if flags.contains(PointsFlags::HAS_ROTATIONS) {
            data.rotations = r.read_shared()?;
        }
        if flags.contains(PointsFlags::HAS_SCALES) {
            data.scales = r.read_shared()?;
        }
        if flags.contains(PointsFlags::HAS_COLORS) {
            data.colors = r.read_shared()?;
        }
        if flags.contains(PointsFlags::HAS_VELOCITIES) {
            data.velocities = r.read_shared()?;
        }
        if flags.contains(PointsFlags::HAS_IDS) {
            data.ids = r.read_shared()?;
        }
        if flags.contains(PointsFlags::HAS_BOUNDS) {
            data.bounds = r.read_pod()?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(offset: f32) -> PointsData {
        let mut data = PointsData {
            points: (0..4).map(|i| Vec3::new(i as f32 + offset, 0.0, 0.0)).collect(),
            colors: vec![Vec4::repeat(1.0); 4].into(),
            ids: vec![0, 1, 2, 3].into(),
            ..Default::default()
        };
        data.update_bounds();
        data
    }

    #[test]
    fn strip_keeps_only_moved_points() {
        let base = cloud(0.0);
        let mut delta = cloud(1.0);
        delta.strip(&base);
        assert!(!delta.is_unchanged());
        assert!(delta.is_topology_unchanged());
        assert_eq!(delta.points.len(), 4);
        assert!(delta.colors.is_empty());
        assert!(delta.ids.is_empty());

        delta.merge(&base);
        assert_eq!(delta.points, cloud(1.0).points);
        assert_eq!(delta.colors, base.colors);
        assert_eq!(delta.ids, base.ids);
    }

    #[test]
    fn merge_keeps_attributes_that_were_really_empty() {
        let base = cloud(0.0);
        let mut a = cloud(1.0);
        a.colors.clear();
        a.strip(&base);
        a.merge(&base);
        assert!(a.colors.is_empty());
    }

    #[test]
    fn lerp_requires_matching_ids() {
        let a = cloud(0.0);
        let mut b = cloud(2.0);
        assert!(PointsData::can_lerp(&a, &b));
        b.ids = vec![3, 2, 1, 0].into();
        assert!(!PointsData::can_lerp(&a, &b));
    }

    #[test]
    fn lerp_updates_bounds() {
        let mut out = PointsData::default();
        out.lerp(&cloud(0.0), &cloud(2.0), 0.5);
        assert_eq!(out.points[0], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(out.bounds.center, Vec3::new(2.5, 0.0, 0.0));
        assert_eq!(out.bounds.extents, Vec3::new(1.5, 0.0, 0.0));
    }
}
