//! Polygon mesh entity data.
//!
//! A [`MeshData`] arrives from a sender as raw polygons with per-vertex or
//! per-corner attributes. [`MeshData::refine`] turns it into an indexed,
//! split and submeshed mesh ready for upload. Before refinement `counts`
//! holds per-face corner counts; afterwards it is empty and `indices` holds
//! split-relative triangle, line and point indices addressed by
//! `submeshes`.

mod ops;
mod refine;

pub use refine::{MeshRefineSettings, RefineFlags};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use meshlink_core::math::{lerp_normals, lerp_tangents, Mat4, NearEqual, Vec2, Vec3, Vec4};
use meshlink_core::mesh::{Split, Submesh, Topology};
use meshlink_core::SharedVec;

use super::{assign_if_flagged, lerp_array, strip_if_equal, strip_if_near, Bounds, Delta};
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

/// Number of UV channels a mesh can carry.
pub const MAX_UV: usize = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MeshFlags: u32 {
        const UNCHANGED = 1 << 0;
        /// Counts, indices and material ids match the base exactly.
        const TOPOLOGY_UNCHANGED = 1 << 1;
        const HAS_REFINE_SETTINGS = 1 << 2;
        const HAS_COUNTS = 1 << 3;
        const HAS_INDICES = 1 << 4;
        const HAS_MATERIAL_IDS = 1 << 5;
        const HAS_POINTS = 1 << 6;
        const HAS_NORMALS = 1 << 7;
        const HAS_TANGENTS = 1 << 8;
        const HAS_COLORS = 1 << 9;
        const HAS_VELOCITIES = 1 << 10;
        const HAS_ROOT_BONE = 1 << 11;
        const HAS_BONES = 1 << 12;
        const HAS_BLENDSHAPES = 1 << 13;
        const HAS_SUBMESHES = 1 << 14;
        const HAS_BOUNDS = 1 << 15;
        const HAS_UV0 = 1 << 16;
        const HAS_UV1 = 1 << 17;
        const HAS_UV2 = 1 << 18;
        const HAS_UV3 = 1 << 19;
        const HAS_UV4 = 1 << 20;
        const HAS_UV5 = 1 << 21;
        const HAS_UV6 = 1 << 22;
        const HAS_UV7 = 1 << 23;

        const TOPOLOGY = Self::HAS_COUNTS.bits()
            | Self::HAS_INDICES.bits()
            | Self::HAS_MATERIAL_IDS.bits();
        const GEOMETRY = Self::HAS_POINTS.bits()
            | Self::HAS_NORMALS.bits()
            | Self::HAS_TANGENTS.bits()
            | Self::HAS_COLORS.bits()
            | Self::HAS_VELOCITIES.bits()
            | (0xff << 16);
    }
}

impl MeshFlags {
    /// Presence bit of UV channel `channel`.
    pub fn uv(channel: usize) -> Self {
        Self::from_bits_retain(Self::HAS_UV0.bits() << channel)
    }
}

/// Four strongest bone influences of a vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Weights4 {
    pub weights: [f32; 4],
    pub indices: [i32; 4],
}

impl Weights4 {
    /// Scales the weights to sum to one. All-zero weights are left alone.
    pub fn normalize(&mut self) {
        let total: f32 = self.weights.iter().sum();
        if total > 0.0 {
            self.weights.iter_mut().for_each(|w| *w /= total);
        }
    }
}

/// One bone influence, used by variable-influence skinning.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Weights1 {
    pub weight: f32,
    pub index: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneData {
    pub path: String,
    pub bindpose: Mat4,
    /// One weight per vertex.
    pub weights: SharedVec<f32>,
}

impl Default for BoneData {
    fn default() -> Self {
        Self {
            path: String::new(),
            bindpose: Mat4::identity(),
            weights: SharedVec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendShapeFrame {
    pub weight: f32,
    pub points: SharedVec<Vec3>,
    pub normals: SharedVec<Vec3>,
    pub tangents: SharedVec<Vec3>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendShapeData {
    pub name: String,
    pub weight: f32,
    pub frames: Vec<BlendShapeFrame>,
}

impl BlendShapeData {
    pub fn sort_frames(&mut self) {
        self.frames.sort_by(|a, b| a.weight.total_cmp(&b.weight));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub flags: MeshFlags,
    /// Attributes removed by `strip` because they matched the base.
    pub stripped: MeshFlags,
    pub refine_settings: MeshRefineSettings,

    pub points: SharedVec<Vec3>,
    pub normals: SharedVec<Vec3>,
    pub tangents: SharedVec<Vec4>,
    pub uv: [SharedVec<Vec2>; MAX_UV],
    pub colors: SharedVec<Vec4>,
    pub velocities: SharedVec<Vec3>,
    pub counts: SharedVec<u32>,
    pub indices: SharedVec<u32>,
    /// One per face, `-1` for no material.
    pub material_ids: SharedVec<i32>,

    pub root_bone: String,
    pub bones: Vec<BoneData>,
    pub blendshapes: Vec<BlendShapeData>,

    pub submeshes: Vec<Submesh>,
    pub splits: Vec<Split>,
    pub bounds: Bounds,

    // Skinning tables built during refinement. Not serialized.
    pub weights4: SharedVec<Weights4>,
    pub bone_counts: SharedVec<u8>,
    pub bone_offsets: SharedVec<u32>,
    pub weights1: SharedVec<Weights1>,
}

impl MeshData {
    pub fn is_unchanged(&self) -> bool {
        self.flags.contains(MeshFlags::UNCHANGED)
    }

    pub fn is_topology_unchanged(&self) -> bool {
        self.flags.contains(MeshFlags::TOPOLOGY_UNCHANGED)
    }

    pub fn update_bounds(&mut self) {
        self.bounds = Bounds::from_points(&self.points);
    }

    fn same_extras(&self, base: &Self) -> bool {
        self.refine_settings == base.refine_settings
            && self.root_bone == base.root_bone
            && self.bones == base.bones
            && self.blendshapes == base.blendshapes
            && self.submeshes == base.submeshes
    }

    fn compare(&self, base: &Self) -> MeshFlags {
        let mut same = MeshFlags::empty();
        same.set(MeshFlags::HAS_COUNTS, self.counts == base.counts);
        same.set(MeshFlags::HAS_INDICES, self.indices == base.indices);
        same.set(
            MeshFlags::HAS_MATERIAL_IDS,
            self.material_ids == base.material_ids,
        );
        same.set(MeshFlags::HAS_POINTS, self.points.near_equal(&base.points));
        same.set(MeshFlags::HAS_NORMALS, self.normals.near_equal(&base.normals));
        same.set(
            MeshFlags::HAS_TANGENTS,
            self.tangents.near_equal(&base.tangents),
        );
        same.set(MeshFlags::HAS_COLORS, self.colors.near_equal(&base.colors));
        same.set(
            MeshFlags::HAS_VELOCITIES,
            self.velocities.near_equal(&base.velocities),
        );
        for (i, (a, b)) in self.uv.iter().zip(&base.uv).enumerate() {
            same.set(MeshFlags::uv(i), a.near_equal(b));
        }
        same
    }

    fn set_change_flags(&mut self, same: MeshFlags, same_extras: bool) {
        self.flags.set(
            MeshFlags::TOPOLOGY_UNCHANGED,
            same.contains(MeshFlags::TOPOLOGY),
        );
        self.flags.set(
            MeshFlags::UNCHANGED,
            same.contains(MeshFlags::TOPOLOGY | MeshFlags::GEOMETRY) && same_extras,
        );
    }

    fn wire_flags(&self) -> MeshFlags {
        if self.is_unchanged() {
            return MeshFlags::UNCHANGED;
        }
        let mut flags = (self.flags & MeshFlags::TOPOLOGY_UNCHANGED)
            | MeshFlags::HAS_REFINE_SETTINGS
            | MeshFlags::HAS_BOUNDS;
        flags.set(MeshFlags::HAS_COUNTS, !self.counts.is_empty());
        flags.set(MeshFlags::HAS_INDICES, !self.indices.is_empty());
        flags.set(MeshFlags::HAS_MATERIAL_IDS, !self.material_ids.is_empty());
        flags.set(MeshFlags::HAS_POINTS, !self.points.is_empty());
        flags.set(MeshFlags::HAS_NORMALS, !self.normals.is_empty());
        flags.set(MeshFlags::HAS_TANGENTS, !self.tangents.is_empty());
        flags.set(MeshFlags::HAS_COLORS, !self.colors.is_empty());
        flags.set(MeshFlags::HAS_VELOCITIES, !self.velocities.is_empty());
        flags.set(MeshFlags::HAS_ROOT_BONE, !self.root_bone.is_empty());
        flags.set(MeshFlags::HAS_BONES, !self.bones.is_empty());
        flags.set(MeshFlags::HAS_BLENDSHAPES, !self.blendshapes.is_empty());
        flags.set(
            MeshFlags::HAS_SUBMESHES,
            !self.submeshes.is_empty() || !self.splits.is_empty(),
        );
        for (i, uv) in self.uv.iter().enumerate() {
            flags.set(MeshFlags::uv(i), !uv.is_empty());
        }
        flags
    }
}

impl Delta for MeshData {
    fn strip(&mut self, base: &Self) {
        let mut same = MeshFlags::empty();
        same.set(
            MeshFlags::HAS_COUNTS,
            strip_if_equal(&mut self.counts, &base.counts),
        );
        same.set(
            MeshFlags::HAS_INDICES,
            strip_if_equal(&mut self.indices, &base.indices),
        );
        same.set(
            MeshFlags::HAS_MATERIAL_IDS,
            strip_if_equal(&mut self.material_ids, &base.material_ids),
        );
        same.set(
            MeshFlags::HAS_POINTS,
            strip_if_near(&mut self.points, &base.points),
        );
        same.set(
            MeshFlags::HAS_NORMALS,
            strip_if_near(&mut self.normals, &base.normals),
        );
        same.set(
            MeshFlags::HAS_TANGENTS,
            strip_if_near(&mut self.tangents, &base.tangents),
        );
        same.set(
            MeshFlags::HAS_COLORS,
            strip_if_near(&mut self.colors, &base.colors),
        );
        same.set(
            MeshFlags::HAS_VELOCITIES,
            strip_if_near(&mut self.velocities, &base.velocities),
        );
        for (i, (uv, base_uv)) in self.uv.iter_mut().zip(&base.uv).enumerate() {
            same.set(MeshFlags::uv(i), strip_if_near(uv, base_uv));
        }

        let same_extras = self.same_extras(base);
        self.stripped = same;
        self.set_change_flags(same, same_extras);
    }

    fn merge(&mut self, base: &Self) {
        let unchanged = self.is_unchanged();
        let restore = if unchanged {
            MeshFlags::TOPOLOGY | MeshFlags::GEOMETRY
        } else {
            self.stripped
        };
        assign_if_flagged(&mut self.counts, &base.counts, restore, MeshFlags::HAS_COUNTS);
        assign_if_flagged(&mut self.indices, &base.indices, restore, MeshFlags::HAS_INDICES);
        assign_if_flagged(
            &mut self.material_ids,
            &base.material_ids,
            restore,
            MeshFlags::HAS_MATERIAL_IDS,
        );
        assign_if_flagged(&mut self.points, &base.points, restore, MeshFlags::HAS_POINTS);
        assign_if_flagged(&mut self.normals, &base.normals, restore, MeshFlags::HAS_NORMALS);
        assign_if_flagged(&mut self.tangents, &base.tangents, restore, MeshFlags::HAS_TANGENTS);
        assign_if_flagged(&mut self.colors, &base.colors, restore, MeshFlags::HAS_COLORS);
        assign_if_flagged(
            &mut self.velocities,
            &base.velocities,
            restore,
            MeshFlags::HAS_VELOCITIES,
        );
        for (i, (uv, base_uv)) in self.uv.iter_mut().zip(&base.uv).enumerate() {
            assign_if_flagged(uv, base_uv, restore, MeshFlags::uv(i));
        }

        if unchanged {
            self.refine_settings = base.refine_settings.clone();
            self.root_bone = base.root_bone.clone();
            self.bones = base.bones.clone();
            self.blendshapes = base.blendshapes.clone();
            self.submeshes = base.submeshes.clone();
            self.splits = base.splits.clone();
            self.bounds = base.bounds;
            self.weights4 = base.weights4.clone();
            self.bone_counts = base.bone_counts.clone();
            self.bone_offsets = base.bone_offsets.clone();
            self.weights1 = base.weights1.clone();
        }
        self.stripped = MeshFlags::empty();
    }

    fn diff(&mut self, base: &Self) {
        let same = self.compare(base);
        let same_extras = self.same_extras(base);
        self.set_change_flags(same, same_extras);
    }

    fn can_lerp(e1: &Self, e2: &Self) -> bool {
        e1.points.len() == e2.points.len() && e1.indices.len() == e2.indices.len()
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32) {
        self.points = lerp_array(&e1.points, &e2.points, t);
        self.normals = if e1.normals.len() == e2.normals.len() {
            let mut normals = Vec::new();
            lerp_normals(&mut normals, &e1.normals, &e2.normals, t);
            normals.into()
        } else {
            e1.normals.clone()
        };
        self.tangents = if e1.tangents.len() == e2.tangents.len() {
            let mut tangents = Vec::new();
            lerp_tangents(&mut tangents, &e1.tangents, &e2.tangents, t);
            tangents.into()
        } else {
            e1.tangents.clone()
        };
        for (dst, (a, b)) in self.uv.iter_mut().zip(e1.uv.iter().zip(&e2.uv)) {
            *dst = lerp_array(a, b, t);
        }
        self.colors = lerp_array(&e1.colors, &e2.colors, t);
        self.velocities = lerp_array(&e1.velocities, &e2.velocities, t);
        self.update_bounds();
    }
}

// ===== Wire format =====

fn topology_tag(topology: Topology) -> u32 {
    match topology {
        Topology::Points => 0,
        Topology::Lines => 1,
        Topology::Triangles => 2,
    }
}

fn topology_from_tag(tag: u32) -> Result<Topology, DecodeError> {
    match tag {
        0 => Ok(Topology::Points),
        1 => Ok(Topology::Lines),
        2 => Ok(Topology::Triangles),
        value => Err(DecodeError::UnknownEnum {
            name: "Topology",
            value,
        }),
    }
}

impl Encode for Submesh {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(topology_tag(self.topology));
        w.write_u32(self.split_index);
        w.write_u32(self.submesh_index);
        w.write_u32(self.index_count);
        w.write_u32(self.index_offset);
        w.write_i32(self.material_id);
    }
}

impl Decode for Submesh {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            topology: topology_from_tag(r.read_u32()?)?,
            split_index: r.read_u32()?,
            submesh_index: r.read_u32()?,
            index_count: r.read_u32()?,
            index_offset: r.read_u32()?,
            material_id: r.read_i32()?,
        })
    }
}

impl Encode for Split {
    fn encode(&self, w: &mut Writer) {
        for v in [
            self.submesh_count,
            self.submesh_offset,
            self.vertex_count,
            self.vertex_offset,
            self.index_count,
            self.index_offset,
            self.face_count,
            self.face_offset,
            self.index_count_tri,
            self.index_count_lines,
            self.index_count_points,
        ] {
            w.write_u32(v);
        }
    }
}

impl Decode for Split {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            submesh_count: r.read_u32()?,
            submesh_offset: r.read_u32()?,
            vertex_count: r.read_u32()?,
            vertex_offset: r.read_u32()?,
            index_count: r.read_u32()?,
            index_offset: r.read_u32()?,
            face_count: r.read_u32()?,
            face_offset: r.read_u32()?,
            index_count_tri: r.read_u32()?,
            index_count_lines: r.read_u32()?,
            index_count_points: r.read_u32()?,
        })
    }
}

impl Encode for BoneData {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.path);
        w.write_pod(&self.bindpose);
        w.write_slice(&self.weights);
    }
}

impl Decode for BoneData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            bindpose: r.read_pod()?,
            weights: r.read_shared()?,
        })
    }
}

impl Encode for BlendShapeFrame {
    fn encode(&self, w: &mut Writer) {
        w.write_f32(self.weight);
        w.write_slice(&self.points);
        w.write_slice(&self.normals);
        w.write_slice(&self.tangents);
    }
}

impl Decode for BlendShapeFrame {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            weight: r.read_f32()?,
            points: r.read_shared()?,
            normals: r.read_shared()?,
            tangents: r.read_shared()?,
        })
    }
}

impl Encode for BlendShapeData {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.name);
        w.write_f32(self.weight);
        w.write_seq(&self.frames);
    }
}

impl Decode for BlendShapeData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            name: r.read_string()?,
            weight: r.read_f32()?,
            frames: r.read_seq()?,
        })
    }
}

impl Encode for MeshData {
    fn encode(&self, w: &mut Writer) {
        let flags = self.wire_flags();
        w.write_u32(flags.bits());
        if flags.contains(MeshFlags::UNCHANGED) {
            return;
        }
        w.write_u32(self.stripped.bits());
        self.refine_settings.encode(w);

        if flags.contains(MeshFlags::HAS_COUNTS) {
            w.write_slice(&self.counts);
        }
        if flags.contains(MeshFlags::HAS_INDICES) {
            w.write_slice(&self.indices);
        }
        if flags.contains(MeshFlags::HAS_MATERIAL_IDS) {
            w.write_slice(&self.material_ids);
        }
        if flags.contains(MeshFlags::HAS_POINTS) {
            w.write_slice(&self.points);
        }
        if flags.contains(MeshFlags::HAS_NORMALS) {
            w.write_slice(&self.normals);
        }
        if flags.contains(MeshFlags::HAS_TANGENTS) {
            w.write_slice(&self.tangents);
        }
        if flags.contains(MeshFlags::HAS_COLORS) {
            w.write_slice(&self.colors);
        }
        if flags.contains(MeshFlags::HAS_VELOCITIES) {
            w.write_slice(&self.velocities);
        }
        for (i, uv) in self.uv.iter().enumerate() {
            if flags.contains(MeshFlags::uv(i)) {
                w.write_slice(uv);
            }
        }
        if flags.contains(MeshFlags::HAS_ROOT_BONE) {
            w.write_str(&self.root_bone);
        }
        if flags.contains(MeshFlags::HAS_BONES) {
            w.write_seq(&self.bones);
        }
        if flags.contains(MeshFlags::HAS_BLENDSHAPES) {
            w.write_seq(&self.blendshapes);
        }
        if flags.contains(MeshFlags::HAS_SUBMESHES) {
            w.write_seq(&self.submeshes);
            w.write_seq(&self.splits);
        }
        w.write_pod(&self.bounds);
    }
}

impl Decode for MeshData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = MeshFlags::from_bits_truncate(r.read_u32()?);
        let mut data = Self {
            flags: flags & (MeshFlags::UNCHANGED | MeshFlags::TOPOLOGY_UNCHANGED),
            ..Self::default()
        };
        if data.is_unchanged() {
            return Ok(data);
        }
        data.stripped = MeshFlags::from_bits_truncate(r.read_u32()?);
        if flags.contains(MeshFlags::HAS_REFINE_SETTINGS) {
            data.refine_settings = MeshRefineSettings::decode(r)?;
        }

        if flags.contains(MeshFlags::HAS_COUNTS) {
            data.counts = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_INDICES) {
            data.indices = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_MATERIAL_IDS) {
            data.material_ids = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_POINTS) {
            data.points = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_NORMALS) {
            data.normals = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_TANGENTS) {
            data.tangents = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_COLORS) {
            data.colors = r.read_shared()?;
        }
        if flags.contains(MeshFlags::HAS_VELOCITIES) {
            data.velocities = r.read_shared()?;
        }
        for (i, uv) in data.uv.iter_mut().enumerate() {
            if flags.contains(MeshFlags::uv(i)) {
                *uv = r.read_shared()?;
            }
        }
        if flags.contains(MeshFlags::HAS_ROOT_BONE) {
            data.root_bone = r.read_string()?;
        }
        if flags.contains(MeshFlags::HAS_BONES) {
            data.bones = r.read_seq()?;
        }
        if flags.contains(MeshFlags::HAS_BLENDSHAPES) {
            data.blendshapes = r.read_seq()?;
        }
        if flags.contains(MeshFlags::HAS_SUBMESHES) {
            data.submeshes = r.read_seq()?;
            data.splits = r.read_seq()?;
        }
        if flags.contains(MeshFlags::HAS_BOUNDS) {
            data.bounds = r.read_pod()?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn quad(z: f32) -> MeshData {
        MeshData {
            points: vec![
                Vec3::new(0.0, 0.0, z),
                Vec3::new(1.0, 0.0, z),
                Vec3::new(1.0, 1.0, z),
                Vec3::new(0.0, 1.0, z),
            ]
            .into(),
            counts: vec![4].into(),
            indices: vec![0, 1, 2, 3].into(),
            material_ids: vec![0].into(),
            ..Default::default()
        }
    }

    fn wire(data: &MeshData) -> MeshData {
        let mut w = Writer::new();
        data.encode(&mut w);
        MeshData::decode(&mut Reader::new(Arc::from(w.into_bytes()))).unwrap()
    }

    #[test]
    fn uv_flags_cover_every_channel() {
        assert_eq!(MeshFlags::uv(0), MeshFlags::HAS_UV0);
        assert_eq!(MeshFlags::uv(7), MeshFlags::HAS_UV7);
        assert!(MeshFlags::GEOMETRY.contains(MeshFlags::HAS_UV5));
    }

    #[test]
    fn moved_points_keep_topology_out_of_the_delta() {
        let base = quad(0.0);
        let mut delta = quad(1.0);
        delta.strip(&base);
        assert!(delta.is_topology_unchanged());
        assert!(!delta.is_unchanged());
        assert!(delta.indices.is_empty());
        assert!(delta.counts.is_empty());
        assert_eq!(delta.points.len(), 4);

        let mut received = wire(&delta);
        received.merge(&base);
        assert_eq!(received.points, quad(1.0).points);
        assert_eq!(received.indices, base.indices);
        assert_eq!(received.counts, base.counts);
    }

    #[test]
    fn identical_mesh_is_a_single_word() {
        let base = quad(0.0);
        let mut delta = base.clone();
        delta.strip(&base);
        assert!(delta.is_unchanged());

        let mut w = Writer::new();
        delta.encode(&mut w);
        assert_eq!(w.len(), 4);
    }

    #[test]
    fn changed_bones_are_not_unchanged() {
        let base = quad(0.0);
        let mut a = quad(0.0);
        a.bones.push(BoneData {
            path: "/root/bone".into(),
            ..Default::default()
        });
        a.strip(&base);
        assert!(!a.is_unchanged());
        assert_eq!(a.bones.len(), 1);
    }

    #[test]
    fn lerp_rejects_different_vertex_counts() {
        let a = quad(0.0);
        let mut b = quad(1.0);
        assert!(MeshData::can_lerp(&a, &b));
        b.points.push(Vec3::zeros());
        assert!(!MeshData::can_lerp(&a, &b));
    }

    #[test]
    fn weights_normalize() {
        let mut w = Weights4 {
            weights: [2.0, 2.0, 0.0, 0.0],
            indices: [0, 1, 0, 0],
        };
        w.normalize();
        assert_eq!(w.weights, [0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn full_mesh_round_trip() {
        let mut mesh = quad(0.0);
        mesh.uv[1] = vec![Vec2::new(0.5, 0.5); 4].into();
        mesh.root_bone = "/root".into();
        mesh.blendshapes.push(BlendShapeData {
            name: "smile".into(),
            weight: 0.25,
            frames: vec![BlendShapeFrame {
                weight: 100.0,
                points: vec![Vec3::new(0.0, 0.1, 0.0); 4].into(),
                ..Default::default()
            }],
        });
        mesh.update_bounds();
        assert_eq!(wire(&mesh), mesh);
    }
}
