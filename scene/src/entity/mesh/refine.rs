//! Receiver-side mesh preparation.
//!
//! [`MeshData::refine`] runs the steps requested by the sender in
//! [`MeshRefineSettings`], in a fixed order:
//!
//! 1. UV flips, then the local/world transforms, then mirroring
//! 2. Skinning tables from the per-bone weights
//! 3. Normal generation, then back faces
//! 4. Either re-indexing into splits and submeshes, or a per-vertex
//!    consistency check when re-indexing is disabled
//!
//! Topology is validated before any step runs, and the steps work on a copy
//! that replaces the mesh only once all of them succeed. Afterwards the
//! settings are reset so that refining again is a no-op.

use std::borrow::Cow;

use bitflags::bitflags;
use meshlink_core::math::{Mat4, Vec2};
use meshlink_core::mesh::{
    generate_normals_poly, generate_normals_with_smooth_angle, generate_tangents,
    validate_topology, Faces, MeshRefiner, RefineError,
};
use meshlink_core::{profile_function, SharedVec};

use super::{MeshData, MAX_UV};
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RefineFlags: u32 {
        /// Keep the sender's vertices. All attributes must be per-vertex.
        const NO_REINDEXING = 1 << 0;
        /// Cut the mesh into splits of at most `split_unit` vertices.
        const SPLIT = 1 << 1;
        const GEN_NORMALS = 1 << 2;
        const GEN_NORMALS_WITH_SMOOTH_ANGLE = 1 << 3;
        const FLIP_NORMALS = 1 << 4;
        const GEN_TANGENTS = 1 << 5;
        const FLIP_U = 1 << 6;
        const FLIP_V = 1 << 7;
        const FLIP_FACES = 1 << 8;
        const MIRROR_X = 1 << 9;
        const MIRROR_Y = 1 << 10;
        const MIRROR_Z = 1 << 11;
        const MAKE_DOUBLE_SIDED = 1 << 12;
        const GEN_POINTS = 1 << 13;
        const GEN_LINES = 1 << 14;
        const GEN_TRIANGLES = 1 << 15;
        const LOCAL2WORLD = 1 << 16;
        const WORLD2LOCAL = 1 << 17;
    }
}

impl Default for RefineFlags {
    fn default() -> Self {
        Self::GEN_POINTS | Self::GEN_LINES | Self::GEN_TRIANGLES
    }
}

/// Sender's request for how a mesh should be prepared.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRefineSettings {
    pub flags: RefineFlags,
    pub split_unit: u32,
    /// `4` or `255`. Anything else drops the skin with a warning.
    pub max_bone_influence: u32,
    /// Degrees. Angles at or above 180 produce fully smooth normals.
    pub smooth_angle: f32,
    pub local2world: Mat4,
    pub world2local: Mat4,
}

impl Default for MeshRefineSettings {
    fn default() -> Self {
        Self {
            flags: RefineFlags::default(),
            split_unit: 65000,
            max_bone_influence: 4,
            smooth_angle: 180.0,
            local2world: Mat4::identity(),
            world2local: Mat4::identity(),
        }
    }
}

impl MeshRefineSettings {
    /// Marks the mesh as already prepared.
    pub fn clear(&mut self) {
        self.flags = RefineFlags::NO_REINDEXING;
    }
}

impl Encode for MeshRefineSettings {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.flags.bits());
        w.write_u32(self.split_unit);
        w.write_u32(self.max_bone_influence);
        w.write_f32(self.smooth_angle);
        w.write_pod(&self.local2world);
        w.write_pod(&self.world2local);
    }
}

impl Decode for MeshRefineSettings {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            flags: RefineFlags::from_bits_truncate(r.read_u32()?),
            split_unit: r.read_u32()?,
            max_bone_influence: r.read_u32()?,
            smooth_angle: r.read_f32()?,
            local2world: r.read_pod()?,
            world2local: r.read_pod()?,
        })
    }
}

fn remap<T: bytemuck::Pod>(values: &[T], new2old: &[u32]) -> SharedVec<T> {
    new2old.iter().map(|&i| values[i as usize]).collect()
}

/// Picks the refiner's output for a per-corner attribute or remaps a
/// per-vertex one. Anything else is dropped.
fn refined_attr<T: bytemuck::Pod>(
    src: &SharedVec<T>,
    per_corner: Vec<T>,
    num_points: usize,
    num_indices: usize,
    new2old: &[u32],
) -> SharedVec<T> {
    if src.len() == num_indices {
        per_corner.into()
    } else if src.len() == num_points {
        remap(src, new2old)
    } else {
        SharedVec::new()
    }
}

/// Remaps a per-vertex attribute, leaving anything else untouched.
fn remap_vertex_attr<T: bytemuck::Pod>(attr: &mut SharedVec<T>, num_points: usize, new2old: &[u32]) {
    if attr.len() == num_points {
        *attr = remap(attr, new2old);
    }
}

impl MeshData {
    /// Face counts, treating a mesh without counts as a triangle list.
    fn face_counts(&self) -> Cow<'_, [u32]> {
        if self.counts.is_empty() {
            Cow::Owned(vec![3; self.indices.len() / 3])
        } else {
            Cow::Borrowed(&self.counts)
        }
    }

    /// Prepares the mesh as requested by its refine settings.
    ///
    /// On error the mesh is left exactly as it was.
    pub fn refine(&mut self) -> Result<(), RefineError> {
        profile_function!();
        validate_topology(
            Faces::Counts(&self.face_counts()),
            &self.indices,
            self.points.len(),
        )?;
        let mut work = self.clone();
        work.refine_steps()?;
        *self = work;
        Ok(())
    }

    fn refine_steps(&mut self) -> Result<(), RefineError> {
        let settings = self.refine_settings.clone();
        let flags = settings.flags;

        if flags.intersects(RefineFlags::FLIP_U | RefineFlags::FLIP_V) {
            for uv in self.uv[0].make_mut() {
                if flags.contains(RefineFlags::FLIP_U) {
                    uv.x = 1.0 - uv.x;
                }
                if flags.contains(RefineFlags::FLIP_V) {
                    uv.y = 1.0 - uv.y;
                }
            }
        }

        if flags.contains(RefineFlags::LOCAL2WORLD) {
            self.transform_mesh(&settings.local2world);
        }
        if flags.contains(RefineFlags::WORLD2LOCAL) {
            self.transform_mesh(&settings.world2local);
        }

        for (axis, flag) in [RefineFlags::MIRROR_X, RefineFlags::MIRROR_Y, RefineFlags::MIRROR_Z]
            .into_iter()
            .enumerate()
        {
            if flags.contains(flag) {
                self.mirror_mesh(axis);
            }
        }

        if !self.bones.is_empty() {
            match settings.max_bone_influence {
                4 => self.setup_bone_weights4(),
                255 => self.setup_bone_weights_variable(),
                other => {
                    log::warn!("unsupported max bone influence {other}, dropping skin");
                    self.bones.clear();
                    self.root_bone.clear();
                }
            }
        }

        let flip_normals =
            flags.contains(RefineFlags::FLIP_NORMALS) ^ flags.contains(RefineFlags::FLIP_FACES);
        let smooth_angle = flags.contains(RefineFlags::GEN_NORMALS_WITH_SMOOTH_ANGLE);
        if flags.contains(RefineFlags::GEN_NORMALS) || (smooth_angle && settings.smooth_angle >= 180.0)
        {
            let counts = self.face_counts();
            let normals = generate_normals_poly(&self.points, &counts, &self.indices, flip_normals)?;
            self.normals = normals.into();
        } else if smooth_angle && !flags.contains(RefineFlags::NO_REINDEXING) {
            let counts = self.face_counts();
            let normals = generate_normals_with_smooth_angle(
                &self.points,
                &counts,
                &self.indices,
                settings.smooth_angle,
                flip_normals,
            )?;
            self.normals = normals.into();
        }

        if flags.contains(RefineFlags::MAKE_DOUBLE_SIDED) {
            self.make_double_sided();
        }

        if flags.contains(RefineFlags::NO_REINDEXING) {
            if flags.contains(RefineFlags::GEN_TANGENTS) {
                let counts = self.face_counts().into_owned();
                self.gen_tangents(&counts, &self.indices.clone())?;
            }
            self.drop_non_vertex_attributes();
        } else {
            self.reindex(&settings)?;
        }

        self.refine_settings.clear();
        self.update_bounds();
        Ok(())
    }

    fn gen_tangents(&mut self, counts: &[u32], indices: &[u32]) -> Result<(), RefineError> {
        let n = self.points.len();
        if self.normals.len() != n || self.uv[0].len() != n {
            log::debug!("tangents need per-vertex normals and uv0, skipping");
            return Ok(());
        }
        let tangents = generate_tangents(&self.points, &self.uv[0], &self.normals, counts, indices)?;
        self.tangents = tangents.into();
        Ok(())
    }

    /// Clears every attribute whose length does not match the point count.
    fn drop_non_vertex_attributes(&mut self) {
        let n = self.points.len();
        fn check<T: bytemuck::Pod>(name: &str, attr: &mut SharedVec<T>, n: usize) {
            if !attr.is_empty() && attr.len() != n {
                log::warn!("{name} has {} values for {n} points, dropping it", attr.len());
                attr.clear();
            }
        }
        check("normals", &mut self.normals, n);
        check("tangents", &mut self.tangents, n);
        for uv in &mut self.uv {
            check("uv", uv, n);
        }
        check("colors", &mut self.colors, n);
        check("velocities", &mut self.velocities, n);
        for frame in self.blendshapes.iter_mut().flat_map(|bs| bs.frames.iter_mut()) {
            check("blendshape points", &mut frame.points, n);
            check("blendshape normals", &mut frame.normals, n);
            check("blendshape tangents", &mut frame.tangents, n);
        }
    }

    /// Rebuilds vertices, splits and submeshes, remapping every attribute.
    fn reindex(&mut self, settings: &MeshRefineSettings) -> Result<(), RefineError> {
        let flags = settings.flags;
        let num_points = self.points.len();
        let num_indices = self.indices.len();

        let counts: Vec<u32> = self.face_counts().into_owned();
        let indices = self.indices.clone();
        let points = self.points.clone();
        let normals = self.normals.clone();
        let tangents = self.tangents.clone();
        let uvs = self.uv.clone();
        let colors = self.colors.clone();
        let material_ids = self.material_ids.clone();

        let mut new_normals = Vec::new();
        let mut new_tangents = Vec::new();
        let mut new_uvs: [Vec<Vec2>; MAX_UV] = Default::default();
        let mut new_colors = Vec::new();

        let refined = {
            let split_unit = if flags.contains(RefineFlags::SPLIT) {
                settings.split_unit
            } else {
                0
            };
            let mut refiner = MeshRefiner::new(&counts, &indices, &points)
                .with_split_unit(split_unit)
                .with_primitives(
                    flags.contains(RefineFlags::GEN_POINTS),
                    flags.contains(RefineFlags::GEN_LINES),
                    flags.contains(RefineFlags::GEN_TRIANGLES),
                );
            if normals.len() == num_indices {
                refiner.add_expanded_attribute("normals", &normals, &mut new_normals)?;
            }
            if tangents.len() == num_indices {
                refiner.add_expanded_attribute("tangents", &tangents, &mut new_tangents)?;
            }
            for (uv, out) in uvs.iter().zip(new_uvs.iter_mut()) {
                if uv.len() == num_indices {
                    refiner.add_expanded_attribute("uv", uv, out)?;
                }
            }
            if colors.len() == num_indices {
                refiner.add_expanded_attribute("colors", &colors, &mut new_colors)?;
            }

            refiner.refine()?;
            refiner.retopology(flags.contains(RefineFlags::FLIP_FACES))?;
            let ids = (material_ids.len() == counts.len()).then_some(&material_ids[..]);
            refiner.gen_submeshes(ids)?;
            refiner.into_output()
        };

        let new2old = &refined.new2old_points;
        self.normals = refined_attr(&normals, new_normals, num_points, num_indices, new2old);
        self.tangents = refined_attr(&tangents, new_tangents, num_points, num_indices, new2old);
        for ((dst, src), per_corner) in self.uv.iter_mut().zip(&uvs).zip(new_uvs) {
            *dst = refined_attr(src, per_corner, num_points, num_indices, new2old);
        }
        self.colors = refined_attr(&colors, new_colors, num_points, num_indices, new2old);
        remap_vertex_attr(&mut self.velocities, num_points, new2old);
        remap_vertex_attr(&mut self.weights4, num_points, new2old);
        for bone in &mut self.bones {
            remap_vertex_attr(&mut bone.weights, num_points, new2old);
        }
        self.remap_variable_weights(num_points, new2old);

        let new2old_corners = &refined.new2old_corners;
        for bs in &mut self.blendshapes {
            bs.sort_frames();
            for frame in &mut bs.frames {
                remap_vertex_attr(&mut frame.points, num_points, new2old);
                if frame.normals.len() == num_indices && num_indices != num_points {
                    frame.normals = remap(&frame.normals, new2old_corners);
                } else {
                    remap_vertex_attr(&mut frame.normals, num_points, new2old);
                }
                remap_vertex_attr(&mut frame.tangents, num_points, new2old);
            }
        }

        self.points = refined.new_points.into();
        if flags.contains(RefineFlags::GEN_TANGENTS) {
            self.gen_tangents(&refined.new_counts, &refined.new_indices)?;
        }
        self.indices = refined.new_indices_submeshes.into();
        self.submeshes = refined.submeshes;
        self.splits = refined.splits;
        self.counts.clear();
        self.material_ids.clear();
        Ok(())
    }

    fn remap_variable_weights(&mut self, num_points: usize, new2old: &[u32]) {
        if self.weights1.is_empty()
            || self.bone_counts.len() != num_points
            || self.bone_offsets.len() != num_points
        {
            return;
        }
        let mut counts = Vec::with_capacity(new2old.len());
        let mut offsets = Vec::with_capacity(new2old.len());
        let mut weights = Vec::with_capacity(self.weights1.len());
        for &old in new2old {
            let count = self.bone_counts[old as usize];
            let begin = self.bone_offsets[old as usize] as usize;
            offsets.push(weights.len() as u32);
            counts.push(count);
            weights.extend_from_slice(&self.weights1[begin..begin + count as usize]);
        }
        self.bone_counts = counts.into();
        self.bone_offsets = offsets.into();
        self.weights1 = weights.into();
    }
}
