//! Normal and tangent synthesis.

use crate::math::{Vec2, Vec3, Vec4, DEG_TO_RAD};
use crate::profile_function;

use super::connection::MeshConnectionInfo;
use super::topology::{validate_topology, Faces};
use super::RefineError;

fn face_normal(points: &[Vec3], face: &[u32], flip: bool) -> Vec3 {
    let (i1, i2) = if flip { (2, 1) } else { (1, 2) };
    let p0 = points[face[0] as usize];
    let p1 = points[face[i1] as usize];
    let p2 = points[face[i2] as usize];
    (p1 - p0).cross(&(p2 - p0))
}

fn normalize_or_zero(v: Vec3) -> Vec3 {
    v.try_normalize(0.0).unwrap_or_else(Vec3::zeros)
}

/// Per-vertex normals from unnormalized (area-weighted) polygon normals.
///
/// Each polygon contributes the cross product of its first two edges to
/// every vertex it touches. Lines and points contribute nothing.
pub fn generate_normals_poly(
    points: &[Vec3],
    counts: &[u32],
    indices: &[u32],
    flip: bool,
) -> Result<Vec<Vec3>, RefineError> {
    profile_function!();
    let faces = Faces::Counts(counts);
    validate_topology(faces, indices, points.len())?;

    let mut normals = vec![Vec3::zeros(); points.len()];
    for (_, first, count) in faces.iter(indices.len()) {
        if count < 3 {
            continue;
        }
        let face = &indices[first..first + count as usize];
        let n = face_normal(points, face, flip);
        for &vi in face {
            normals[vi as usize] += n;
        }
    }
    normals.iter_mut().for_each(|n| *n = normalize_or_zero(*n));
    Ok(normals)
}

/// Per-corner normals with hard edges where adjacent faces meet at more
/// than `smooth_angle` degrees.
///
/// Each corner sums the unit normals of the faces around its vertex whose
/// normal is within the angle of its own face's normal.
pub fn generate_normals_with_smooth_angle(
    points: &[Vec3],
    counts: &[u32],
    indices: &[u32],
    smooth_angle: f32,
    flip: bool,
) -> Result<Vec<Vec3>, RefineError> {
    profile_function!();
    let faces = Faces::Counts(counts);
    let connection = MeshConnectionInfo::build(indices, faces, points)?;

    let face_normals: Vec<Vec3> = faces
        .iter(indices.len())
        .map(|(_, first, count)| {
            if count < 3 {
                Vec3::zeros()
            } else {
                normalize_or_zero(face_normal(points, &indices[first..first + count as usize], flip))
            }
        })
        .collect();

    let threshold = (smooth_angle * DEG_TO_RAD).cos() - 0.001;
    let mut normals = vec![Vec3::zeros(); indices.len()];
    for (fi, first, count) in faces.iter(indices.len()) {
        if count < 3 {
            continue;
        }
        let own = face_normals[fi];
        for corner in first..first + count as usize {
            let mut sum = Vec3::zeros();
            connection.each_connected_face(indices[corner], |other, _| {
                let n = face_normals[other as usize];
                if own.dot(&n) > threshold {
                    sum += n;
                }
            });
            normals[corner] = normalize_or_zero(sum);
        }
    }
    Ok(normals)
}

/// Angle at `center` between the directions to `a` and `b`.
fn corner_angle(a: Vec3, b: Vec3, center: Vec3) -> f32 {
    (a - center).angle(&(b - center))
}

fn triangle_tangent(p: [Vec3; 3], uv: [Vec2; 3]) -> Option<(Vec3, Vec3)> {
    let e1 = p[1] - p[0];
    let e2 = p[2] - p[0];
    let s = Vec2::new(uv[1].x - uv[0].x, uv[2].x - uv[0].x);
    let t = Vec2::new(uv[1].y - uv[0].y, uv[2].y - uv[0].y);

    let div = s.x * t.y - s.y * t.x;
    let area = div.abs();
    if area <= 1e-8 {
        return None;
    }
    let r = 1.0 / div;
    let (s, t) = (s * r, t * r);
    let tangent = normalize_or_zero(e1 * t.y - e2 * t.x) * area;
    let binormal = normalize_or_zero(e2 * s.x - e1 * s.y) * area;
    Some((tangent, binormal))
}

fn orthogonalize_tangent(tangent: Vec3, binormal: Vec3, normal: Vec3) -> Vec4 {
    let mut t = tangent - normal * normal.dot(&tangent);
    let mag_t = t.norm();
    t /= mag_t;

    let mut b = binormal - normal * normal.dot(&binormal) + t * (t.dot(&binormal) * mag_t);
    let mag_b = b.norm();
    b /= mag_b;

    if !(mag_t > 1e-6 && mag_b > 1e-6) {
        // Degenerate: pick the two axes least aligned with the normal.
        let mut axes = [Vec3::x(), Vec3::y(), Vec3::z()];
        axes.sort_by(|a, b| a.dot(&normal).abs().total_cmp(&b.dot(&normal).abs()));
        t = normalize_or_zero(axes[0] - normal * normal.dot(&axes[0]));
        b = normalize_or_zero(axes[1] - normal * normal.dot(&axes[1]) - t * t.dot(&axes[1]));
    }

    let w = if normal.cross(&t).dot(&b) > 0.0 { 1.0 } else { -1.0 };
    Vec4::new(t.x, t.y, t.z, w)
}

/// Per-vertex tangents (xyz, w = bitangent sign).
///
/// Needs per-vertex `normals` and `uv` (first channel). If either is
/// missing or has the wrong length the result is all zeros, as is the
/// tangent of any vertex no face references.
pub fn generate_tangents(
    points: &[Vec3],
    uv: &[Vec2],
    normals: &[Vec3],
    counts: &[u32],
    indices: &[u32],
) -> Result<Vec<Vec4>, RefineError> {
    profile_function!();
    let faces = Faces::Counts(counts);
    validate_topology(faces, indices, points.len())?;

    let mut result = vec![Vec4::zeros(); points.len()];
    if uv.len() != points.len() || normals.len() != points.len() {
        log::debug!(
            "skipping tangents: {} uvs, {} normals for {} points",
            uv.len(),
            normals.len(),
            points.len()
        );
        return Ok(result);
    }

    let mut tangents = vec![Vec3::zeros(); points.len()];
    let mut binormals = vec![Vec3::zeros(); points.len()];
    let mut referenced = vec![false; points.len()];
    for (_, first, count) in faces.iter(indices.len()) {
        let face = &indices[first..first + count as usize];
        for &v in face {
            referenced[v as usize] = true;
        }
        for k in 1..face.len().saturating_sub(1) {
            let tri = [face[0] as usize, face[k] as usize, face[k + 1] as usize];
            let p = tri.map(|i| points[i]);
            let Some((t, b)) = triangle_tangent(p, tri.map(|i| uv[i])) else {
                continue;
            };
            let angles = [
                corner_angle(p[2], p[1], p[0]),
                corner_angle(p[0], p[2], p[1]),
                corner_angle(p[1], p[0], p[2]),
            ];
            for (v, angle) in tri.iter().zip(angles) {
                tangents[*v] += t * angle;
                binormals[*v] += b * angle;
            }
        }
    }

    // Vertices outside every face keep a zero tangent.
    for (i, out) in result.iter_mut().enumerate() {
        if referenced[i] {
            *out = orthogonalize_tangent(tangents[i], binormals[i], normals[i]);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::NearEqual;

    fn unit_quad() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn coplanar_quad_has_uniform_smooth_normals() {
        let normals =
            generate_normals_with_smooth_angle(&unit_quad(), &[4], &[0, 1, 2, 3], 180.0, false)
                .unwrap();
        assert_eq!(normals.len(), 4);
        for n in &normals {
            assert!(n.near_equal(&Vec3::z()));
        }
    }

    #[test]
    fn flip_reverses_normals() {
        let normals = generate_normals_poly(&unit_quad(), &[4], &[0, 1, 2, 3], true).unwrap();
        assert!(normals[0].near_equal(&-Vec3::z()));
    }

    #[test]
    fn poly_normals_are_area_weighted() {
        // A large triangle facing +Z and a small one facing +X share vertex 0.
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let normals =
            generate_normals_poly(&points, &[3, 3], &[0, 1, 2, 0, 3, 4], false).unwrap();
        let n = normals[0];
        assert!(n.z > n.x * 10.0);
        assert!(normals[1].near_equal(&Vec3::z()));
        assert!(normals[3].near_equal(&Vec3::x()));
    }

    #[test]
    fn crease_beyond_angle_stays_hard() {
        // Two quads folded 90 degrees along the edge (1, 2).
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
        ];
        let counts = [4, 4];
        let indices = [0, 1, 2, 3, 1, 4, 5, 2];

        let hard =
            generate_normals_with_smooth_angle(&points, &counts, &indices, 30.0, false).unwrap();
        assert!(hard[1].near_equal(&Vec3::z()));
        assert!(hard[4].near_equal(&Vec3::x()));

        let smooth =
            generate_normals_with_smooth_angle(&points, &counts, &indices, 120.0, false).unwrap();
        let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!(smooth[1].near_equal(&expected));
        assert!(smooth[4].near_equal(&expected));
    }

    #[test]
    fn tangents_follow_u_direction() {
        let points = unit_quad();
        let uv: Vec<Vec2> = points.iter().map(|p| Vec2::new(p.x, p.y)).collect();
        let normals = vec![Vec3::z(); 4];
        let tangents = generate_tangents(&points, &uv, &normals, &[4], &[0, 1, 2, 3]).unwrap();
        for t in &tangents {
            assert!(t.near_equal(&Vec4::new(1.0, 0.0, 0.0, 1.0)), "{t:?}");
        }
    }

    #[test]
    fn tangents_without_uv_are_zero() {
        let normals = vec![Vec3::z(); 4];
        let tangents = generate_tangents(&unit_quad(), &[], &normals, &[4], &[0, 1, 2, 3]).unwrap();
        assert!(tangents.iter().all(|t| *t == Vec4::zeros()));
    }

    #[test]
    fn unreferenced_vertex_has_zero_tangent() {
        let mut points = unit_quad();
        points.push(Vec3::new(5.0, 5.0, 0.0));
        let uv: Vec<Vec2> = points.iter().map(|p| Vec2::new(p.x, p.y)).collect();
        let normals = vec![Vec3::z(); 5];
        let tangents = generate_tangents(&points, &uv, &normals, &[4], &[0, 1, 2, 3]).unwrap();
        assert_eq!(tangents[4], Vec4::zeros());
        assert!(tangents[0].near_equal(&Vec4::new(1.0, 0.0, 0.0, 1.0)));
    }
}
