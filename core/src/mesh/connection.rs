//! Vertex to face adjacency and positional weld maps.

use crate::math::Vec3;
use crate::profile_function;

use super::topology::{face_offsets, validate_topology, Faces};
use super::RefineError;

/// Per-vertex list of incident `(face, corner)` pairs, optionally built over
/// welded vertex ids.
///
/// The table is immutable once built. Rebuild it whenever topology changes.
#[derive(Debug, Clone, Default)]
pub struct MeshConnectionInfo {
    pub v2f_counts: Vec<u32>,
    pub v2f_offsets: Vec<u32>,
    pub v2f_faces: Vec<u32>,
    pub v2f_indices: Vec<u32>,

    /// Canonical (lowest) vertex id per vertex. Empty when built unwelded.
    pub weld_map: Vec<u32>,
    pub weld_counts: Vec<u32>,
    pub weld_offsets: Vec<u32>,
    pub weld_indices: Vec<u32>,

    face_offsets: Vec<u32>,
}

impl MeshConnectionInfo {
    /// Builds adjacency directly over `indices`.
    pub fn build(indices: &[u32], faces: Faces<'_>, points: &[Vec3]) -> Result<Self, RefineError> {
        let mut info = Self::default();
        info.build_adjacency(indices, faces, points.len())?;
        Ok(info)
    }

    /// Welds vertices whose positions differ by at most `tolerance` per
    /// component, then builds adjacency over the welded ids so co-located
    /// vertices share one entry.
    pub fn build_welded(
        indices: &[u32],
        faces: Faces<'_>,
        points: &[Vec3],
        tolerance: f32,
    ) -> Result<Self, RefineError> {
        let mut info = Self::default();
        info.build_weld_map(points, tolerance);
        info.build_adjacency(indices, faces, points.len())?;
        Ok(info)
    }

    pub fn clear(&mut self) {
        self.v2f_counts.clear();
        self.v2f_offsets.clear();
        self.v2f_faces.clear();
        self.v2f_indices.clear();
        self.weld_map.clear();
        self.weld_counts.clear();
        self.weld_offsets.clear();
        self.weld_indices.clear();
        self.face_offsets.clear();
    }

    /// Number of vertices the table was built for.
    pub fn num_vertices(&self) -> usize {
        self.v2f_counts.len()
    }

    pub fn is_welded(&self) -> bool {
        !self.weld_map.is_empty()
    }

    /// Canonical id of `vi` (itself when unwelded).
    pub fn canonical(&self, vi: u32) -> u32 {
        self.weld_map.get(vi as usize).copied().unwrap_or(vi)
    }

    /// Incident `(face, corner)` pairs of `vi` in table order.
    pub fn connected_faces(&self, vi: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let v = self.canonical(vi) as usize;
        let offset = self.v2f_offsets[v] as usize;
        let count = self.v2f_counts[v] as usize;
        let range = offset..offset + count;
        self.v2f_faces[range.clone()]
            .iter()
            .copied()
            .zip(self.v2f_indices[range].iter().copied())
    }

    /// Invokes `body(face, corner)` for every face touching `vi`.
    pub fn each_connected_face(&self, vi: u32, mut body: impl FnMut(u32, u32)) {
        for (face, corner) in self.connected_faces(vi) {
            body(face, corner);
        }
    }

    /// Invokes `body(v)` for every vertex welded together with `vi`,
    /// including `vi` itself.
    pub fn each_welded_vertex(&self, vi: u32, mut body: impl FnMut(u32)) {
        if !self.is_welded() {
            body(vi);
            return;
        }
        let v = self.canonical(vi) as usize;
        let offset = self.weld_offsets[v] as usize;
        let count = self.weld_counts[v] as usize;
        for &w in &self.weld_indices[offset..offset + count] {
            body(w);
        }
    }

    /// `true` if exactly one polygon uses the edge `(i0, i1)`.
    ///
    /// `indices` must be the buffer the table was built from.
    pub fn is_edge_open(&self, indices: &[u32], i0: u32, i1: u32) -> bool {
        let target = self.canonical(i1);
        let mut shared = 0;
        for (face, corner) in self.connected_faces(i0) {
            let Some((prev, next)) = self.neighbours(face, corner) else {
                continue;
            };
            if self.canonical(indices[prev]) == target || self.canonical(indices[next]) == target {
                shared += 1;
            }
        }
        shared == 1
    }

    /// `true` if `vi` lies on at least one open edge.
    pub fn on_edge(&self, indices: &[u32], vi: u32) -> bool {
        self.connected_faces(vi).any(|(face, corner)| {
            self.neighbours(face, corner).is_some_and(|(prev, next)| {
                self.is_edge_open(indices, vi, indices[prev])
                    || self.is_edge_open(indices, vi, indices[next])
            })
        })
    }

    /// Previous and next corner of `corner` within polygon `face`.
    /// Lines and points have no edges.
    fn neighbours(&self, face: u32, corner: u32) -> Option<(usize, usize)> {
        let begin = self.face_offsets[face as usize] as usize;
        let end = self.face_offsets[face as usize + 1] as usize;
        let count = end - begin;
        if count < 3 {
            return None;
        }
        let local = corner as usize - begin;
        let prev = begin + (local + count - 1) % count;
        let next = begin + (local + 1) % count;
        Some((prev, next))
    }

    fn build_adjacency(
        &mut self,
        indices: &[u32],
        faces: Faces<'_>,
        num_points: usize,
    ) -> Result<(), RefineError> {
        profile_function!();
        validate_topology(faces, indices, num_points)?;

        self.face_offsets = face_offsets(faces, indices.len());
        self.v2f_counts = vec![0; num_points];
        for &vi in indices {
            let v = self.canonical(vi) as usize;
            self.v2f_counts[v] += 1;
        }

        self.v2f_offsets = Vec::with_capacity(num_points);
        let mut total = 0u32;
        for &count in &self.v2f_counts {
            self.v2f_offsets.push(total);
            total += count;
        }

        self.v2f_faces = vec![0; total as usize];
        self.v2f_indices = vec![0; total as usize];
        let mut cursor = self.v2f_offsets.clone();
        for (fi, first, count) in faces.iter(indices.len()) {
            for corner in first..first + count as usize {
                let v = self.canonical(indices[corner]) as usize;
                let slot = cursor[v] as usize;
                self.v2f_faces[slot] = fi as u32;
                self.v2f_indices[slot] = corner as u32;
                cursor[v] += 1;
            }
        }
        Ok(())
    }

    fn build_weld_map(&mut self, points: &[Vec3], tolerance: f32) {
        profile_function!();
        let n = points.len();
        let mut order: Vec<u32> = (0..n as u32).collect();
        order.sort_by(|&a, &b| points[a as usize].x.total_cmp(&points[b as usize].x));

        let mut parent: Vec<u32> = (0..n as u32).collect();
        for (k, &a) in order.iter().enumerate() {
            let pa = points[a as usize];
            for &b in &order[k + 1..] {
                let pb = points[b as usize];
                if pb.x - pa.x > tolerance {
                    break;
                }
                if (pa - pb).amax() <= tolerance {
                    union_min(&mut parent, a, b);
                }
            }
        }

        self.weld_map = (0..n as u32).map(|v| find_root(&mut parent, v)).collect();

        self.weld_counts = vec![0; n];
        for &c in &self.weld_map {
            self.weld_counts[c as usize] += 1;
        }
        self.weld_offsets = Vec::with_capacity(n);
        let mut total = 0u32;
        for &count in &self.weld_counts {
            self.weld_offsets.push(total);
            total += count;
        }
        self.weld_indices = vec![0; n];
        let mut cursor = self.weld_offsets.clone();
        for (v, &c) in self.weld_map.iter().enumerate() {
            self.weld_indices[cursor[c as usize] as usize] = v as u32;
            cursor[c as usize] += 1;
        }
        log::trace!(
            "weld map: {} vertices, {} groups",
            n,
            self.weld_counts.iter().filter(|&&c| c > 0).count()
        );
    }
}

fn find_root(parent: &mut [u32], v: u32) -> u32 {
    let mut root = v;
    while parent[root as usize] != root {
        root = parent[root as usize];
    }
    let mut cur = v;
    while parent[cur as usize] != root {
        let next = parent[cur as usize];
        parent[cur as usize] = root;
        cur = next;
    }
    root
}

// The smaller root wins so canonical ids are the lowest index in a group.
fn union_min(parent: &mut [u32], a: u32, b: u32) {
    let ra = find_root(parent, a);
    let rb = find_root(parent, b);
    if ra != rb {
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi as usize] = lo;
    }
}
