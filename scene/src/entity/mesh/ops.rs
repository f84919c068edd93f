//! In-place geometry edits applied before re-indexing.

use bytemuck::Pod;
use meshlink_core::math::{transform_point, transform_vector, Mat4, NearEqual, Vec3, Vec4};
use meshlink_core::SharedVec;

use super::{MeshData, Weights1, Weights4};

const MAX_VARIABLE_INFLUENCE: usize = 255;

fn mirror3(mut v: Vec3, axis: usize) -> Vec3 {
    v[axis] = -v[axis];
    v
}

fn mirror4(mut v: Vec4, axis: usize) -> Vec4 {
    v[axis] = -v[axis];
    v
}

/// Appends `f(attr[i])` for every `i` in `sources` when `attr` has
/// `expected` elements.
fn append_from<T: Pod>(attr: &mut SharedVec<T>, expected: usize, sources: &[u32], f: impl Fn(T) -> T) {
    if attr.len() != expected || sources.is_empty() {
        return;
    }
    let values = attr.make_mut();
    values.reserve(sources.len());
    for &i in sources {
        let v = f(values[i as usize]);
        values.push(v);
    }
}

/// Extends a per-vertex or per-corner attribute onto mirrored geometry.
fn append_mirrored<T: Pod>(
    attr: &mut SharedVec<T>,
    num_points: usize,
    num_indices: usize,
    copied_points: &[u32],
    reversed_corners: &[u32],
    f: impl Fn(T) -> T,
) {
    if attr.len() == num_points {
        append_from(attr, num_points, copied_points, f);
    } else if attr.len() == num_indices {
        append_from(attr, num_indices, reversed_corners, f);
    }
}

/// Source corner of every corner of the reversed copy of each face.
fn reversed_corners(counts: &[u32], skip: impl Fn(u32) -> bool) -> (Vec<u32>, Vec<u32>) {
    let mut faces = Vec::new();
    let mut corners = Vec::new();
    let mut offset = 0u32;
    for (fi, &count) in counts.iter().enumerate() {
        if !skip(count) {
            faces.push(fi as u32);
            corners.extend((0..count).map(|ci| offset + count - ci - 1));
        }
        offset += count;
    }
    (faces, corners)
}

impl MeshData {
    /// Transforms points, normals and velocities by `m`.
    pub(crate) fn transform_mesh(&mut self, m: &Mat4) {
        if m.near_equal(&Mat4::identity()) {
            return;
        }
        for p in self.points.make_mut() {
            *p = transform_point(m, *p);
        }
        for n in self.normals.make_mut() {
            let v = transform_vector(m, *n);
            *n = v.try_normalize(0.0).unwrap_or(v);
        }
        for v in self.velocities.make_mut() {
            *v = transform_vector(m, *v);
        }
    }

    /// Appends a copy of the mesh mirrored across the plane through the
    /// origin perpendicular to `axis`. Points on the plane are shared by
    /// both halves.
    pub(crate) fn mirror_mesh(&mut self, axis: usize) {
        let num_points = self.points.len();
        let num_faces = self.counts.len();
        let num_indices = self.indices.len();

        let mut remap = vec![0u32; num_points];
        let mut copied = Vec::with_capacity(num_points);
        for (pi, p) in self.points.iter().enumerate() {
            if p[axis].near_equal(&0.0) {
                remap[pi] = pi as u32;
            } else {
                remap[pi] = (num_points + copied.len()) as u32;
                copied.push(pi as u32);
            }
        }
        let (_, corners) = reversed_corners(&self.counts, |_| false);

        append_from(&mut self.points, num_points, &copied, |p| mirror3(p, axis));
        let counts = self.counts.make_mut();
        counts.extend_from_within(..num_faces);
        let indices = self.indices.make_mut();
        for &c in &corners {
            let mirrored = remap[indices[c as usize] as usize];
            indices.push(mirrored);
        }
        if self.material_ids.len() == num_faces {
            self.material_ids.make_mut().extend_from_within(..);
        }

        append_mirrored(&mut self.normals, num_points, num_indices, &copied, &corners, |n| {
            mirror3(n, axis)
        });
        append_mirrored(&mut self.tangents, num_points, num_indices, &copied, &corners, |t| {
            mirror4(t, axis)
        });
        for uv in &mut self.uv {
            append_mirrored(uv, num_points, num_indices, &copied, &corners, |v| v);
        }
        append_mirrored(&mut self.colors, num_points, num_indices, &copied, &corners, |c| c);
        append_from(&mut self.velocities, num_points, &copied, |v| mirror3(v, axis));

        for bone in &mut self.bones {
            append_from(&mut bone.weights, num_points, &copied, |w| w);
        }
        for frame in self.blendshapes.iter_mut().flat_map(|bs| bs.frames.iter_mut()) {
            append_from(&mut frame.points, num_points, &copied, |p| mirror3(p, axis));
            append_mirrored(&mut frame.normals, num_points, num_indices, &copied, &corners, |n| {
                mirror3(n, axis)
            });
            append_mirrored(&mut frame.tangents, num_points, num_indices, &copied, &corners, |t| {
                mirror3(t, axis)
            });
        }
    }

    /// Appends a reversed copy of every polygon with at least three corners.
    /// Per-vertex normals and tangents are expanded to per-corner so the
    /// back faces can carry negated ones.
    pub(crate) fn make_double_sided(&mut self) {
        let num_points = self.points.len();
        let num_faces = self.counts.len();
        let num_indices = self.indices.len();

        let (faces, corners) = reversed_corners(&self.counts, |count| count < 3);
        if faces.is_empty() {
            return;
        }

        let counts = self.counts.make_mut();
        for &fi in &faces {
            let count = counts[fi as usize];
            counts.push(count);
        }
        let indices = self.indices.make_mut();
        for &c in &corners {
            let vi = indices[c as usize];
            indices.push(vi);
        }
        append_from(&mut self.material_ids, num_faces, &faces, |id| id);

        let old_indices = &self.indices[..num_indices];
        if self.normals.len() == num_points {
            self.normals = old_indices.iter().map(|&i| self.normals[i as usize]).collect();
        }
        append_from(&mut self.normals, num_indices, &corners, |n| -n);

        if self.tangents.len() == num_points {
            self.tangents = old_indices.iter().map(|&i| self.tangents[i as usize]).collect();
        }
        append_from(&mut self.tangents, num_indices, &corners, |t| {
            Vec4::new(-t.x, -t.y, -t.z, t.w)
        });

        for uv in &mut self.uv {
            append_from(uv, num_indices, &corners, |v| v);
        }
        append_from(&mut self.colors, num_indices, &corners, |c| c);
    }

    /// Builds `weights4` from the per-bone weight arrays: the four largest
    /// influences of each vertex, normalized.
    pub(crate) fn setup_bone_weights4(&mut self) {
        let num_points = self.points.len();
        let mut result = vec![Weights4::default(); num_points];
        let mut influences: Vec<Weights1> = Vec::with_capacity(self.bones.len());
        for (vi, w4) in result.iter_mut().enumerate() {
            self.collect_influences(vi, &mut influences);
            influences.truncate(4);
            for (slot, w1) in influences.iter().enumerate() {
                w4.weights[slot] = w1.weight;
                w4.indices[slot] = w1.index;
            }
            w4.normalize();
        }
        self.weights4 = result.into();
    }

    /// Builds the variable-influence tables: up to 255 normalized weights
    /// per vertex in descending order.
    pub(crate) fn setup_bone_weights_variable(&mut self) {
        let num_points = self.points.len();
        let mut counts = Vec::with_capacity(num_points);
        let mut offsets = Vec::with_capacity(num_points);
        let mut weights = Vec::new();
        let mut influences: Vec<Weights1> = Vec::with_capacity(self.bones.len());
        for vi in 0..num_points {
            self.collect_influences(vi, &mut influences);
            influences.truncate(MAX_VARIABLE_INFLUENCE);
            let total: f32 = influences.iter().map(|w| w.weight).sum();
            if total > 0.0 {
                influences.iter_mut().for_each(|w| w.weight /= total);
            }
            offsets.push(weights.len() as u32);
            counts.push(influences.len() as u8);
            weights.extend_from_slice(&influences);
        }
        self.bone_counts = counts.into();
        self.bone_offsets = offsets.into();
        self.weights1 = weights.into();
    }

    /// Positive influences on vertex `vi`, strongest first.
    fn collect_influences(&self, vi: usize, out: &mut Vec<Weights1>) {
        out.clear();
        out.extend(self.bones.iter().enumerate().filter_map(|(bi, bone)| {
            let weight = bone.weights.get(vi).copied().unwrap_or(0.0);
            (weight > 0.0).then_some(Weights1 {
                weight,
                index: bi as i32,
            })
        }));
        out.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::mesh::BoneData;
    use meshlink_core::math::Vec2;

    fn quad() -> MeshData {
        MeshData {
            points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ]
            .into(),
            counts: vec![4].into(),
            indices: vec![0, 1, 2, 3].into(),
            ..Default::default()
        }
    }

    #[test]
    fn mirror_shares_points_on_the_plane() {
        let mut mesh = quad();
        mesh.mirror_mesh(0);
        // Two of the four points lie on x = 0.
        assert_eq!(mesh.points.len(), 6);
        assert_eq!(mesh.points[4], Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(&*mesh.counts, &[4, 4]);
        // The mirrored face is wound in reverse.
        assert_eq!(&mesh.indices[4..], &[3, 5, 4, 0]);
    }

    #[test]
    fn mirror_extends_per_corner_uvs() {
        let mut mesh = quad();
        mesh.counts = vec![3, 3].into();
        mesh.indices = vec![0, 1, 2, 0, 2, 3].into();
        mesh.uv[0] = (0..6).map(|i| Vec2::new(i as f32, 0.0)).collect();
        mesh.mirror_mesh(1);
        assert_eq!(mesh.uv[0].len(), 12);
        assert_eq!(mesh.uv[0][6], Vec2::new(2.0, 0.0));
        assert_eq!(mesh.uv[0][9], Vec2::new(5.0, 0.0));
    }

    #[test]
    fn double_sided_negates_back_normals() {
        let mut mesh = quad();
        mesh.counts = vec![4, 2].into();
        mesh.indices = vec![0, 1, 2, 3, 0, 2].into();
        mesh.normals = vec![Vec3::z(); 4].into();
        mesh.make_double_sided();

        // The line is not duplicated.
        assert_eq!(&*mesh.counts, &[4, 2, 4]);
        assert_eq!(&mesh.indices[6..], &[3, 2, 1, 0]);
        assert_eq!(mesh.normals.len(), 10);
        assert_eq!(mesh.normals[6], -Vec3::z());
        assert_eq!(mesh.normals[0], Vec3::z());
    }

    #[test]
    fn transform_normalizes_normals() {
        let mut mesh = quad();
        mesh.normals = vec![Vec3::z(); 4].into();
        let m = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 2.0, 2.0));
        mesh.transform_mesh(&m);
        assert_eq!(mesh.points[2], Vec3::new(2.0, 2.0, 0.0));
        assert!(mesh.normals[0].near_equal(&Vec3::z()));
    }

    #[test]
    fn four_strongest_influences_win() {
        let mut mesh = quad();
        mesh.bones = [0.1f32, 0.4, 0.2, 0.0, 0.3, 0.05]
            .iter()
            .map(|&w| BoneData {
                weights: vec![w; 4].into(),
                ..Default::default()
            })
            .collect();
        mesh.setup_bone_weights4();
        let w = mesh.weights4[0];
        assert_eq!(w.indices, [1, 4, 2, 0]);
        let total: f32 = w.weights.iter().sum();
        assert!(total.near_equal(&1.0));
        assert!(w.weights[0] > w.weights[1]);
    }

    #[test]
    fn variable_influences_are_sorted_and_normalized() {
        let mut mesh = quad();
        mesh.bones = [0.25f32, 0.75]
            .iter()
            .map(|&w| BoneData {
                weights: vec![w; 4].into(),
                ..Default::default()
            })
            .collect();
        mesh.setup_bone_weights_variable();
        assert_eq!(&*mesh.bone_counts, &[2, 2, 2, 2]);
        assert_eq!(&*mesh.bone_offsets, &[0, 2, 4, 6]);
        assert_eq!(mesh.weights1[0].index, 1);
        assert!(mesh.weights1[0].weight.near_equal(&0.75));
    }
}
