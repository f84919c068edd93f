//! Math type aliases and helper functions.
//!
//! All scene data is f32. Quaternions follow nalgebra's storage order
//! (`[x, y, z, w]` in memory), which matches the wire layout.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32). Stored as `[x, y, z, w]` in memory.
/// Use [`quat_from_xyzw`] or `Quaternion::new(w, x, y, z)` to construct.
pub type Quat = nalgebra::Quaternion<f32>;

/// Default tolerance for [`NearEqual`].
pub const EPSILON: f32 = 1e-4;

/// Degrees to radians factor.
pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

// ===== Construction helpers =====

/// Build a 4x4 TRS matrix from scale, rotation (quaternion), and translation.
pub fn mat4_from_scale_rotation_translation(
    scale: Vec3,
    rotation: Quat,
    translation: Vec3,
) -> Mat4 {
    let r = nalgebra::UnitQuaternion::new_unchecked(rotation);
    let m = r.to_rotation_matrix();
    let rm = m.matrix();
    #[rustfmt::skip]
    let result = Mat4::new(
        rm[(0, 0)] * scale.x, rm[(0, 1)] * scale.y, rm[(0, 2)] * scale.z, translation.x,
        rm[(1, 0)] * scale.x, rm[(1, 1)] * scale.y, rm[(1, 2)] * scale.z, translation.y,
        rm[(2, 0)] * scale.x, rm[(2, 1)] * scale.y, rm[(2, 2)] * scale.z, translation.z,
        0.0,                  0.0,                  0.0,                  1.0,
    );
    result
}

/// Create a quaternion from x, y, z, w components.
pub fn quat_from_xyzw(x: f32, y: f32, z: f32, w: f32) -> Quat {
    nalgebra::Quaternion::new(w, x, y, z)
}

/// Create a quaternion from rotation around the X axis.
pub fn quat_from_rotation_x(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::x_axis(), angle).into_inner()
}

/// Create a quaternion from rotation around the Y axis.
pub fn quat_from_rotation_y(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angle).into_inner()
}

/// Rotate a vector by a quaternion.
pub fn quat_rotate_vec3(q: Quat, v: Vec3) -> Vec3 {
    nalgebra::UnitQuaternion::new_unchecked(q) * v
}

/// Transform a point (w = 1) by a 4x4 matrix.
pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let r = m * Vec4::new(p.x, p.y, p.z, 1.0);
    Vec3::new(r.x, r.y, r.z)
}

/// Transform a direction (w = 0) by a 4x4 matrix.
pub fn transform_vector(m: &Mat4, v: Vec3) -> Vec3 {
    let r = m * Vec4::new(v.x, v.y, v.z, 0.0);
    Vec3::new(r.x, r.y, r.z)
}

/// Decompose a 4x4 matrix into (scale, rotation, translation).
pub fn to_scale_rotation_translation(m: &Mat4) -> (Vec3, Quat, Vec3) {
    let translation = Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let col0 = Vec3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
    let col1 = Vec3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]);
    let col2 = Vec3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]);
    let sx = col0.norm();
    let sy = col1.norm();
    let sz = col2.norm();
    let scale = Vec3::new(sx, sy, sz);
    let rot_mat = nalgebra::Matrix3::from_columns(&[col0 / sx, col1 / sy, col2 / sz]);
    let rotation = nalgebra::UnitQuaternion::from_rotation_matrix(
        &nalgebra::Rotation3::from_matrix_unchecked(rot_mat),
    )
    .into_inner();
    (scale, rotation, translation)
}

/// Component-wise minimum and maximum of a point set.
///
/// Returns `None` for an empty slice.
pub fn min_max(points: &[Vec3]) -> Option<(Vec3, Vec3)> {
    let first = *points.first()?;
    Some(points.iter().fold((first, first), |(lo, hi), p| {
        (lo.inf(p), hi.sup(p))
    }))
}

// ===== Tolerance comparison =====

/// Approximate equality used by the delta operators.
pub trait NearEqual {
    fn near_equal_eps(&self, other: &Self, eps: f32) -> bool;

    fn near_equal(&self, other: &Self) -> bool {
        self.near_equal_eps(other, EPSILON)
    }
}

impl NearEqual for f32 {
    fn near_equal_eps(&self, other: &Self, eps: f32) -> bool {
        (self - other).abs() < eps
    }
}

impl<const R: usize, const C: usize> NearEqual for nalgebra::SMatrix<f32, R, C> {
    fn near_equal_eps(&self, other: &Self, eps: f32) -> bool {
        self.iter().zip(other.iter()).all(|(a, b)| (a - b).abs() < eps)
    }
}

impl NearEqual for Quat {
    fn near_equal_eps(&self, other: &Self, eps: f32) -> bool {
        self.coords.near_equal_eps(&other.coords, eps)
    }
}

impl<T: NearEqual> NearEqual for [T] {
    fn near_equal_eps(&self, other: &Self, eps: f32) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.near_equal_eps(b, eps))
    }
}

// ===== Interpolation =====

/// Linear interpolation between two values of the same shape.
pub trait Lerp: Sized {
    fn lerp_between(a: &Self, b: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp_between(a: &Self, b: &Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

impl<const R: usize, const C: usize> Lerp for nalgebra::SMatrix<f32, R, C> {
    fn lerp_between(a: &Self, b: &Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

/// Linear interpolation, `a` at `t = 0` and `b` at `t = 1`.
pub fn lerp<T: Lerp>(a: &T, b: &T, t: f32) -> T {
    T::lerp_between(a, b, t)
}

/// Normalized linear quaternion interpolation along the shortest arc.
pub fn nlerp(q1: &Quat, q2: &Quat, t: f32) -> Quat {
    let target = if q1.dot(q2) < 0.0 { -*q2 } else { *q2 };
    let q = Quat::from(q1.coords + (target.coords - q1.coords) * t);
    let n = q.norm();
    if n > 0.0 {
        q / n
    } else {
        *q1
    }
}

/// Spherical quaternion interpolation along the shortest arc.
///
/// Falls back to [`nlerp`] when the inputs are nearly parallel.
pub fn slerp(q1: &Quat, q2: &Quat, t: f32) -> Quat {
    let mut d = q1.dot(q2);
    let target = if d < 0.0 {
        d = -d;
        -*q2
    } else {
        *q2
    };

    if d < 0.95 {
        let angle = d.acos();
        let inv_sin = 1.0 / angle.sin();
        let s0 = (angle * (1.0 - t)).sin() * inv_sin;
        let s1 = (angle * t).sin() * inv_sin;
        Quat::from(q1.coords * s0 + target.coords * s1)
    } else {
        nlerp(q1, &target, t)
    }
}

/// Interpolate a slice of normals and renormalize each result.
pub fn lerp_normals(dst: &mut Vec<Vec3>, a: &[Vec3], b: &[Vec3], t: f32) {
    dst.clear();
    dst.extend(a.iter().zip(b).map(|(a, b)| {
        let n = a.lerp(b, t);
        n.try_normalize(0.0).unwrap_or(n)
    }));
}

/// Interpolate a slice of tangents (xyz renormalized, w is the handedness sign).
pub fn lerp_tangents(dst: &mut Vec<Vec4>, a: &[Vec4], b: &[Vec4], t: f32) {
    dst.clear();
    dst.extend(a.iter().zip(b).map(|(a, b)| {
        let xyz = a.xyz().lerp(&b.xyz(), t);
        let xyz = xyz.try_normalize(0.0).unwrap_or(xyz);
        Vec4::new(xyz.x, xyz.y, xyz.z, if t < 0.5 { a.w } else { b.w })
    }));
}

// ===== Axis conversion =====

/// Axis permutations and mirrors used by coordinate conversion.
///
/// Every operation is applied consistently to positions, directions,
/// rotations and matrices so that converted transforms compose.
pub trait AxisFlip: Sized {
    /// Mirror across the YZ plane.
    fn flip_x(&self) -> Self;
    /// Mirror across the XY plane.
    fn flip_z(&self) -> Self;
    /// Exchange the Y and Z axes.
    fn swap_yz(&self) -> Self;
}

impl AxisFlip for Vec3 {
    fn flip_x(&self) -> Self {
        Vec3::new(-self.x, self.y, self.z)
    }
    fn flip_z(&self) -> Self {
        Vec3::new(self.x, self.y, -self.z)
    }
    fn swap_yz(&self) -> Self {
        Vec3::new(self.x, self.z, self.y)
    }
}

impl AxisFlip for Vec4 {
    fn flip_x(&self) -> Self {
        Vec4::new(-self.x, self.y, self.z, self.w)
    }
    fn flip_z(&self) -> Self {
        Vec4::new(self.x, self.y, -self.z, self.w)
    }
    fn swap_yz(&self) -> Self {
        Vec4::new(self.x, self.z, self.y, self.w)
    }
}

impl AxisFlip for Quat {
    fn flip_x(&self) -> Self {
        quat_from_xyzw(self.i, -self.j, -self.k, self.w)
    }
    fn flip_z(&self) -> Self {
        quat_from_xyzw(-self.i, -self.j, self.k, self.w)
    }
    fn swap_yz(&self) -> Self {
        quat_from_xyzw(-self.i, -self.k, -self.j, self.w)
    }
}

impl AxisFlip for Mat4 {
    fn flip_x(&self) -> Self {
        let s = Mat4::from_diagonal(&Vec4::new(-1.0, 1.0, 1.0, 1.0));
        s * self * s
    }
    fn flip_z(&self) -> Self {
        let s = Mat4::from_diagonal(&Vec4::new(1.0, 1.0, -1.0, 1.0));
        s * self * s
    }
    fn swap_yz(&self) -> Self {
        #[rustfmt::skip]
        let p = Mat4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        p * self * p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_trs_matrix() {
        let m = mat4_from_scale_rotation_translation(
            Vec3::new(1.0, 1.0, 1.0),
            Quat::identity(),
            Vec3::zeros(),
        );
        assert!((m - Mat4::identity()).norm() < 1e-6);
    }

    #[test]
    fn rotation_y_90() {
        let q = quat_from_rotation_y(FRAC_PI_2);
        let v = quat_rotate_vec3(q, Vec3::new(1.0, 0.0, 0.0));
        assert!((v.x - 0.0).abs() < 1e-5);
        assert!((v.z - (-1.0)).abs() < 1e-5);
    }

    #[test]
    fn decompose_trs_roundtrip() {
        let s = Vec3::new(2.0, 3.0, 4.0);
        let r = quat_from_rotation_y(1.0);
        let t = Vec3::new(5.0, 6.0, 7.0);
        let m = mat4_from_scale_rotation_translation(s, r, t);
        let (s2, r2, t2) = to_scale_rotation_translation(&m);
        assert!((s - s2).norm() < 1e-5);
        assert!((t - t2).norm() < 1e-5);
        let test = Vec3::new(1.0, 0.0, 0.0);
        assert!((quat_rotate_vec3(r, test) - quat_rotate_vec3(r2, test)).norm() < 1e-5);
    }

    #[test]
    fn slerp_endpoints() {
        let a = quat_from_rotation_x(0.3);
        let b = quat_from_rotation_y(1.2);
        assert!(slerp(&a, &b, 0.0).near_equal(&a));
        assert!(slerp(&a, &b, 1.0).near_equal(&b));
    }

    #[test]
    fn slerp_takes_shortest_arc() {
        let a = Quat::identity();
        let b = -quat_from_rotation_y(0.2);
        let mid = slerp(&a, &b, 0.5);
        let expected = quat_from_rotation_y(0.1);
        assert!(mid.near_equal(&expected));
    }

    #[test]
    fn near_equal_slices_require_same_length() {
        let a = [Vec3::new(1.0, 2.0, 3.0)];
        let b = [Vec3::new(1.0, 2.0, 3.00001)];
        assert!(a[..].near_equal(&b[..]));
        assert!(!a[..].near_equal(&[][..]));
    }

    #[test]
    fn flip_x_matrix_matches_vector_flip() {
        let m = mat4_from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 1.0),
            quat_from_rotation_y(0.7),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let p = Vec3::new(0.5, -1.0, 2.0);
        let lhs = transform_point(&m.flip_x(), p.flip_x());
        let rhs = transform_point(&m, p).flip_x();
        assert!(lhs.near_equal(&rhs));
    }

    #[test]
    fn swap_yz_quat_matches_vector_swap() {
        let q = quat_from_rotation_y(0.4) * quat_from_rotation_x(0.9);
        let v = Vec3::new(0.3, 0.2, -0.8);
        let lhs = quat_rotate_vec3(q.swap_yz(), v.swap_yz());
        let rhs = quat_rotate_vec3(q, v).swap_yz();
        assert!(lhs.near_equal(&rhs));
    }

    #[test]
    fn min_max_of_points() {
        let pts = [
            Vec3::new(1.0, -2.0, 0.0),
            Vec3::new(-1.0, 4.0, 2.0),
        ];
        let (lo, hi) = min_max(&pts).unwrap();
        assert_eq!(lo, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(hi, Vec3::new(1.0, 4.0, 2.0));
        assert!(min_max(&[]).is_none());
    }
}
