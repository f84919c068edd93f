//! Connectivity-aware vertex deduplication and re-indexing.
//!
//! [`MeshRefiner`] turns raw per-corner data into an indexed mesh cut into
//! size-bounded splits, then buckets the result by primitive kind and
//! material.
//!
//! ```ignore
//! let mut uv_out = Vec::new();
//! let mut refiner = MeshRefiner::new(&counts, &indices, &points).with_split_unit(65000);
//! refiner.add_expanded_attribute("uv0", &uvs, &mut uv_out)?;
//! refiner.refine()?;
//! refiner.retopology(false)?;
//! refiner.gen_submeshes(Some(&material_ids))?;
//! let refined = refiner.into_output();
//! ```
//!
//! # Vertex cache
//!
//! Each adjacency entry of a source vertex is one cache slot. A corner walks
//! the slots of its vertex and reuses the first emitted vertex whose bound
//! attributes all compare equal; otherwise it emits a new vertex and records
//! it in the first empty slot. Only vertices emitted within the current
//! split are considered: the cache is reset at every split boundary.

use crate::math::Vec3;
use crate::{profile_function, profile_scope};

use super::connection::MeshConnectionInfo;
use super::topology::{triangulated_index_count, validate_topology, Faces};
use super::RefineError;

const NO_VERTEX: u32 = u32::MAX;

/// Primitive kind of a submesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    Points,
    Lines,
    #[default]
    Triangles,
}

impl Topology {
    /// Primitive kind produced by a polygon with `count` corners.
    pub fn from_arity(count: u32) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Self::Points),
            2 => Some(Self::Lines),
            _ => Some(Self::Triangles),
        }
    }
}

/// A contiguous run of refined faces whose vertex count fits the budget.
///
/// Face and index offsets refer to the refined (`new_counts`/`new_indices`)
/// buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Split {
    pub submesh_count: u32,
    pub submesh_offset: u32,
    pub vertex_count: u32,
    pub vertex_offset: u32,
    pub index_count: u32,
    pub index_offset: u32,
    pub face_count: u32,
    pub face_offset: u32,

    pub index_count_tri: u32,
    pub index_count_lines: u32,
    pub index_count_points: u32,
}

/// Index range for one (split, material, topology) tuple.
///
/// `index_offset` points into [`RefinedMesh::new_indices_submeshes`], whose
/// values are relative to the owning split's `vertex_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Submesh {
    pub topology: Topology,
    pub split_index: u32,
    pub submesh_index: u32,
    pub index_count: u32,
    pub index_offset: u32,
    pub material_id: i32,
}

/// Progress of a [`MeshRefiner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefineState {
    #[default]
    Cleared,
    Refined,
    Retopologized,
    Done,
}

/// Buffers produced by a refinement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinedMesh {
    pub new_points: Vec<Vec3>,
    /// Source vertex of each refined vertex.
    pub new2old_points: Vec<u32>,
    /// Source corner that emitted each refined vertex.
    pub new2old_corners: Vec<u32>,
    /// Source face of each refined face.
    pub new2old_faces: Vec<u32>,
    pub new_counts: Vec<u32>,
    /// Non-triangulated indices, one per kept corner.
    pub new_indices: Vec<u32>,
    pub new_indices_tri: Vec<u32>,
    pub new_indices_lines: Vec<u32>,
    pub new_indices_points: Vec<u32>,
    pub new_indices_submeshes: Vec<u32>,
    pub splits: Vec<Split>,
    pub submeshes: Vec<Submesh>,
}

impl RefinedMesh {
    pub fn triangle_index_count(&self) -> u32 {
        self.splits.iter().map(|s| s.index_count_tri).sum()
    }

    pub fn line_index_count(&self) -> u32 {
        self.splits.iter().map(|s| s.index_count_lines).sum()
    }

    pub fn point_index_count(&self) -> u32 {
        self.splits.iter().map(|s| s.index_count_points).sum()
    }

    /// Submeshes belonging to split `index`.
    pub fn split_submeshes(&self, index: usize) -> &[Submesh] {
        let split = &self.splits[index];
        let begin = split.submesh_offset as usize;
        &self.submeshes[begin..begin + split.submesh_count as usize]
    }

    fn clear(&mut self) {
        self.new_points.clear();
        self.new2old_points.clear();
        self.new2old_corners.clear();
        self.new2old_faces.clear();
        self.new_counts.clear();
        self.new_indices.clear();
        self.new_indices_tri.clear();
        self.new_indices_lines.clear();
        self.new_indices_points.clear();
        self.new_indices_submeshes.clear();
        self.splits.clear();
        self.submeshes.clear();
    }
}

trait RefineAttribute {
    fn prepare(&mut self, num_corners: usize);
    fn matches(&self, new_index: usize, corner: usize) -> bool;
    fn emit(&mut self, corner: usize);
}

/// Values addressed through their own per-corner index stream.
struct IndexedAttribute<'a, T> {
    values: &'a [T],
    indices: &'a [u32],
    new_values: &'a mut Vec<T>,
}

impl<T: Copy + PartialEq> RefineAttribute for IndexedAttribute<'_, T> {
    fn prepare(&mut self, num_corners: usize) {
        self.new_values.clear();
        self.new_values.reserve(num_corners);
    }

    fn matches(&self, new_index: usize, corner: usize) -> bool {
        self.new_values[new_index] == self.values[self.indices[corner] as usize]
    }

    fn emit(&mut self, corner: usize) {
        self.new_values
            .push(self.values[self.indices[corner] as usize]);
    }
}

/// One value per corner.
struct ExpandedAttribute<'a, T> {
    values: &'a [T],
    new_values: &'a mut Vec<T>,
}

impl<T: Copy + PartialEq> RefineAttribute for ExpandedAttribute<'_, T> {
    fn prepare(&mut self, num_corners: usize) {
        self.new_values.clear();
        self.new_values.reserve(num_corners);
    }

    fn matches(&self, new_index: usize, corner: usize) -> bool {
        self.new_values[new_index] == self.values[corner]
    }

    fn emit(&mut self, corner: usize) {
        self.new_values.push(self.values[corner]);
    }
}

/// Re-indexes a polygon mesh. See the module documentation for the
/// call sequence.
pub struct MeshRefiner<'a> {
    split_unit: u32,
    gen_points: bool,
    gen_lines: bool,
    gen_triangles: bool,

    counts: &'a [u32],
    indices: &'a [u32],
    points: &'a [Vec3],
    attributes: Vec<Box<dyn RefineAttribute + 'a>>,

    connection: MeshConnectionInfo,
    old2new_indices: Vec<u32>,
    output: RefinedMesh,
    state: RefineState,
}

impl<'a> MeshRefiner<'a> {
    pub fn new(counts: &'a [u32], indices: &'a [u32], points: &'a [Vec3]) -> Self {
        Self {
            split_unit: 0,
            gen_points: true,
            gen_lines: true,
            gen_triangles: true,
            counts,
            indices,
            points,
            attributes: Vec::new(),
            connection: MeshConnectionInfo::default(),
            old2new_indices: Vec::new(),
            output: RefinedMesh::default(),
            state: RefineState::Cleared,
        }
    }

    /// Maximum vertex count per split. `0` disables splitting.
    #[must_use]
    pub fn with_split_unit(mut self, split_unit: u32) -> Self {
        self.split_unit = split_unit;
        self
    }

    /// Which polygon arities are kept: points (1), lines (2), polygons (3+).
    #[must_use]
    pub fn with_primitives(mut self, points: bool, lines: bool, triangles: bool) -> Self {
        self.gen_points = points;
        self.gen_lines = lines;
        self.gen_triangles = triangles;
        self
    }

    pub fn set_split_unit(&mut self, split_unit: u32) {
        self.split_unit = split_unit;
    }

    pub fn split_unit(&self) -> u32 {
        self.split_unit
    }

    pub fn state(&self) -> RefineState {
        self.state
    }

    pub fn connection(&self) -> &MeshConnectionInfo {
        &self.connection
    }

    pub fn output(&self) -> &RefinedMesh {
        &self.output
    }

    pub fn into_output(self) -> RefinedMesh {
        self.output
    }

    /// Replaces the input topology. Implies [`clear`](Self::clear) and drops
    /// the cached connectivity.
    pub fn set_topology(&mut self, counts: &'a [u32], indices: &'a [u32], points: &'a [Vec3]) {
        self.clear();
        self.connection.clear();
        self.counts = counts;
        self.indices = indices;
        self.points = points;
    }

    /// Returns to [`RefineState::Cleared`]: unbinds attributes, resets
    /// settings and empties the outputs. Connectivity for the current
    /// topology is kept.
    pub fn clear(&mut self) {
        self.split_unit = 0;
        self.gen_points = true;
        self.gen_lines = true;
        self.gen_triangles = true;
        self.attributes.clear();
        self.old2new_indices.clear();
        self.output.clear();
        self.state = RefineState::Cleared;
    }

    /// Binds an attribute with its own per-corner index stream.
    pub fn add_indexed_attribute<T: Copy + PartialEq + 'a>(
        &mut self,
        name: &'static str,
        values: &'a [T],
        indices: &'a [u32],
        new_values: &'a mut Vec<T>,
    ) -> Result<(), RefineError> {
        self.expect_state(RefineState::Cleared)?;
        if indices.len() != self.indices.len() {
            return Err(self.length_mismatch(name, indices.len()));
        }
        if let Some((corner, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= values.len())
        {
            return Err(RefineError::IndexOutOfRange {
                corner,
                index,
                vertices: values.len(),
            });
        }
        self.attributes.push(Box::new(IndexedAttribute {
            values,
            indices,
            new_values,
        }));
        Ok(())
    }

    /// Binds a per-vertex attribute, addressed through the mesh indices.
    pub fn add_vertex_attribute<T: Copy + PartialEq + 'a>(
        &mut self,
        name: &'static str,
        values: &'a [T],
        new_values: &'a mut Vec<T>,
    ) -> Result<(), RefineError> {
        if values.len() != self.points.len() {
            return Err(self.length_mismatch(name, values.len()));
        }
        let indices = self.indices;
        self.add_indexed_attribute(name, values, indices, new_values)
    }

    /// Binds a per-corner attribute.
    pub fn add_expanded_attribute<T: Copy + PartialEq + 'a>(
        &mut self,
        name: &'static str,
        values: &'a [T],
        new_values: &'a mut Vec<T>,
    ) -> Result<(), RefineError> {
        self.expect_state(RefineState::Cleared)?;
        if values.len() != self.indices.len() {
            return Err(self.length_mismatch(name, values.len()));
        }
        self.attributes.push(Box::new(ExpandedAttribute { values, new_values }));
        Ok(())
    }

    /// Deduplicates vertices and cuts the mesh into splits.
    pub fn refine(&mut self) -> Result<(), RefineError> {
        profile_function!();
        self.expect_state(RefineState::Cleared)?;
        validate_topology(Faces::Counts(self.counts), self.indices, self.points.len())?;

        let flags = (self.gen_points, self.gen_lines, self.gen_triangles);
        let split_unit = self.split_unit;
        let counts = self.counts;
        let indices = self.indices;
        let points = self.points;

        if split_unit > 0 {
            if let Some((face, &arity)) = counts
                .iter()
                .enumerate()
                .find(|&(_, &c)| c > split_unit && arity_enabled(c, flags))
            {
                return Err(RefineError::SplitBudgetTooSmall {
                    budget: split_unit,
                    arity,
                    face,
                });
            }
        }

        self.build_connection()?;

        let num_indices = indices.len();
        let out = &mut self.output;
        out.new_points.reserve(num_indices);
        out.new_indices.reserve(num_indices);
        out.new_counts.reserve(counts.len());
        for attr in &mut self.attributes {
            attr.prepare(num_indices);
        }
        self.old2new_indices.clear();
        self.old2new_indices.resize(num_indices, NO_VERTEX);

        let mut split = Split::default();
        let mut offset = 0usize;
        for (fi, &count) in counts.iter().enumerate() {
            let first = offset;
            offset += count as usize;
            if !arity_enabled(count, flags) {
                continue;
            }

            let used = out.new_points.len() as u32 - split.vertex_offset;
            if split_unit > 0 && used + count > split_unit {
                split = close_split(out, split);
                self.old2new_indices.fill(NO_VERTEX);
            }

            for ii in first..offset {
                let ni = find_or_emit_vertex(
                    &self.connection,
                    &mut self.old2new_indices,
                    &mut self.attributes,
                    points,
                    out,
                    indices[ii],
                    ii,
                );
                out.new_indices.push(ni);
            }

            split.face_count += 1;
            out.new_counts.push(count);
            out.new2old_faces.push(fi as u32);
            match count {
                1 => split.index_count_points += 1,
                2 => split.index_count_lines += 2,
                _ => split.index_count_tri += triangulated_index_count(count),
            }
        }
        close_split(out, split);

        log::debug!(
            "refined {} corners into {} vertices across {} split(s)",
            num_indices,
            out.new_points.len(),
            out.splits.len()
        );
        self.state = RefineState::Refined;
        Ok(())
    }

    /// Fan-triangulates polygons and sorts lines and points into their own
    /// index buckets. `flip_faces` reverses the triangle winding.
    pub fn retopology(&mut self, flip_faces: bool) -> Result<(), RefineError> {
        profile_function!();
        self.expect_state(RefineState::Refined)?;

        let (i1, i2) = if flip_faces { (2, 1) } else { (1, 2) };
        let out = &mut self.output;
        out.new_indices_tri.clear();
        out.new_indices_lines.clear();
        out.new_indices_points.clear();
        out.new_indices_tri
            .reserve(out.splits.iter().map(|s| s.index_count_tri as usize).sum());

        let mut n = 0usize;
        for &count in &out.new_counts {
            let face = &out.new_indices[n..n + count as usize];
            match count {
                1 => out.new_indices_points.push(face[0]),
                2 => out.new_indices_lines.extend_from_slice(face),
                _ => {
                    for ni in 0..face.len() - 2 {
                        out.new_indices_tri
                            .extend_from_slice(&[face[0], face[ni + i1], face[ni + i2]]);
                    }
                }
            }
            n += count as usize;
        }

        self.state = RefineState::Retopologized;
        Ok(())
    }

    /// Groups each split's indices into submeshes: one per material for
    /// triangles (`-1` is "no material"), then one for lines and one for
    /// points. `material_ids` is per source face.
    pub fn gen_submeshes(&mut self, material_ids: Option<&[i32]>) -> Result<(), RefineError> {
        profile_scope!("gen_submeshes");
        self.expect_state(RefineState::Retopologized)?;
        if let Some(ids) = material_ids {
            if ids.len() != self.counts.len() {
                return Err(RefineError::MaterialIdsMismatch {
                    len: ids.len(),
                    faces: self.counts.len(),
                });
            }
        }

        let out = &mut self.output;
        out.submeshes.clear();
        out.new_indices_submeshes.clear();
        out.new_indices_submeshes.reserve(
            out.new_indices_tri.len() + out.new_indices_lines.len() + out.new_indices_points.len(),
        );

        let mut tri = 0usize;
        let mut lines = 0usize;
        let mut pts = 0usize;
        let mut buckets: Vec<Vec<u32>> = Vec::new();
        for (spi, split) in out.splits.iter_mut().enumerate() {
            let base = split.vertex_offset;
            split.submesh_offset = out.submeshes.len() as u32;
            split.submesh_count = 0;

            let mut push = |topology: Topology, material_id: i32, indices: &[u32]| {
                out.submeshes.push(Submesh {
                    topology,
                    split_index: spi as u32,
                    submesh_index: split.submesh_count,
                    index_count: indices.len() as u32,
                    index_offset: out.new_indices_submeshes.len() as u32,
                    material_id,
                });
                out.new_indices_submeshes
                    .extend(indices.iter().map(|&i| i - base));
                split.submesh_count += 1;
            };

            if split.index_count_tri > 0 {
                buckets.iter_mut().for_each(Vec::clear);
                let faces = split.face_offset as usize..(split.face_offset + split.face_count) as usize;
                for fi in faces {
                    let count = out.new_counts[fi];
                    if count < 3 {
                        continue;
                    }
                    let bucket = match material_ids {
                        Some(ids) => (ids[out.new2old_faces[fi] as usize].max(-1) + 1) as usize,
                        None => 0,
                    };
                    if buckets.len() <= bucket {
                        buckets.resize_with(bucket + 1, Vec::new);
                    }
                    let n = triangulated_index_count(count) as usize;
                    buckets[bucket].extend_from_slice(&out.new_indices_tri[tri..tri + n]);
                    tri += n;
                }
                for (bucket, indices) in buckets.iter().enumerate() {
                    if !indices.is_empty() {
                        push(Topology::Triangles, bucket as i32 - 1, indices);
                    }
                }
            }

            let n = split.index_count_lines as usize;
            if n > 0 {
                push(Topology::Lines, 0, &out.new_indices_lines[lines..lines + n]);
                lines += n;
            }

            let n = split.index_count_points as usize;
            if n > 0 {
                push(Topology::Points, 0, &out.new_indices_points[pts..pts + n]);
                pts += n;
            }
        }

        self.state = RefineState::Done;
        Ok(())
    }

    fn build_connection(&mut self) -> Result<(), RefineError> {
        if self.connection.num_vertices() != self.points.len() {
            self.connection =
                MeshConnectionInfo::build(self.indices, Faces::Counts(self.counts), self.points)?;
        }
        Ok(())
    }

    fn expect_state(&self, expected: RefineState) -> Result<(), RefineError> {
        if self.state != expected {
            return Err(RefineError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn length_mismatch(&self, name: &'static str, len: usize) -> RefineError {
        RefineError::AttributeLengthMismatch {
            name,
            len,
            vertices: self.points.len(),
            corners: self.indices.len(),
        }
    }
}

fn arity_enabled(count: u32, (points, lines, triangles): (bool, bool, bool)) -> bool {
    match count {
        0 => false,
        1 => points,
        2 => lines,
        _ => triangles,
    }
}

fn close_split(out: &mut RefinedMesh, mut split: Split) -> Split {
    split.vertex_count = out.new_points.len() as u32 - split.vertex_offset;
    split.index_count = out.new_indices.len() as u32 - split.index_offset;
    out.splits.push(split);
    Split {
        face_offset: split.face_offset + split.face_count,
        index_offset: split.index_offset + split.index_count,
        vertex_offset: split.vertex_offset + split.vertex_count,
        ..Default::default()
    }
}

fn find_or_emit_vertex<'a>(
    connection: &MeshConnectionInfo,
    old2new: &mut [u32],
    attributes: &mut [Box<dyn RefineAttribute + 'a>],
    points: &[Vec3],
    out: &mut RefinedMesh,
    vi: u32,
    corner: usize,
) -> u32 {
    let first = connection.v2f_offsets[vi as usize] as usize;
    let slots = first..first + connection.v2f_counts[vi as usize] as usize;

    let mut empty = None;
    for slot in slots {
        let key = connection.v2f_indices[slot] as usize;
        let cached = old2new[key];
        if cached == NO_VERTEX {
            empty.get_or_insert(key);
            continue;
        }
        if attributes
            .iter()
            .all(|attr| attr.matches(cached as usize, corner))
        {
            return cached;
        }
    }

    let ni = out.new_points.len() as u32;
    out.new_points.push(points[vi as usize]);
    out.new2old_points.push(vi);
    out.new2old_corners.push(corner as u32);
    for attr in attributes.iter_mut() {
        attr.emit(corner);
    }
    // Every emission fills a slot of its own vertex, so one is always free.
    if let Some(key) = empty {
        old2new[key] = ni;
    }
    ni
}
