//! Packed numeric encodings.
//!
//! Normalized fixed-point scalars, 10:10:10 packed directions, a
//! smallest-three quaternion and min/max quantized arrays. Half floats come
//! from the [`half`] crate.

use bytemuck::{Pod, Zeroable};

use crate::math::{quat_from_xyzw, Quat, Vec3, Vec4};

pub use half::f16;

macro_rules! normalized_scalar {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $lo:expr, $scale:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
        pub struct $name(pub $repr);

        impl $name {
            pub fn from_f32(v: f32) -> Self {
                Self((v.clamp($lo, 1.0) * $scale).round() as $repr)
            }

            pub fn to_f32(self) -> f32 {
                (self.0 as f32 / $scale).max($lo)
            }
        }

        impl From<f32> for $name {
            fn from(v: f32) -> Self {
                Self::from_f32(v)
            }
        }

        impl From<$name> for f32 {
            fn from(v: $name) -> f32 {
                v.to_f32()
            }
        }
    };
}

normalized_scalar!(
    /// Signed normalized 8-bit value in `[-1, 1]`.
    Snorm8, i8, -1.0, 127.0
);
normalized_scalar!(
    /// Unsigned normalized 8-bit value in `[0, 1]`.
    Unorm8, u8, 0.0, 255.0
);
normalized_scalar!(
    /// Signed normalized 16-bit value in `[-1, 1]`.
    Snorm16, i16, -1.0, 32767.0
);
normalized_scalar!(
    /// Unsigned normalized 16-bit value in `[0, 1]`.
    Unorm16, u16, 0.0, 65535.0
);

/// Convert a float vector to half precision.
pub fn to_half3(v: &Vec3) -> [f16; 3] {
    [f16::from_f32(v.x), f16::from_f32(v.y), f16::from_f32(v.z)]
}

/// Expand a half precision vector.
pub fn from_half3(v: [f16; 3]) -> Vec3 {
    Vec3::new(v[0].to_f32(), v[1].to_f32(), v[2].to_f32())
}

/// Three signed normalized 10-bit components in one `u32`.
///
/// The top two bits are free; [`encode_tangent`] uses them for the
/// bitangent sign.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Snorm10x3(pub u32);

impl Snorm10x3 {
    const MAX: f32 = 1023.0;

    fn pack(a: f32) -> u32 {
        ((a.clamp(-1.0, 1.0) * 0.5 + 0.5) * Self::MAX).round() as u32
    }

    fn unpack(a: u32) -> f32 {
        (a & 0x3ff) as f32 / Self::MAX * 2.0 - 1.0
    }

    pub fn new(v: &Vec3) -> Self {
        Self(Self::pack(v.x) | (Self::pack(v.y) << 10) | (Self::pack(v.z) << 20))
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            Self::unpack(self.0),
            Self::unpack(self.0 >> 10),
            Self::unpack(self.0 >> 20),
        )
    }

    /// The two spare bits.
    pub fn tag(self) -> u32 {
        self.0 >> 30
    }

    #[must_use]
    pub fn with_tag(self, tag: u32) -> Self {
        Self((self.0 & 0x3fff_ffff) | ((tag & 0x3) << 30))
    }
}

/// Pack a tangent (xyz direction, w = ±1) into 32 bits.
pub fn encode_tangent(t: &Vec4) -> Snorm10x3 {
    Snorm10x3::new(&t.xyz()).with_tag(u32::from(t.w < 0.0))
}

/// Inverse of [`encode_tangent`].
pub fn decode_tangent(p: Snorm10x3) -> Vec4 {
    let v = p.to_vec3();
    Vec4::new(v.x, v.y, v.z, if p.tag() == 1 { -1.0 } else { 1.0 })
}

/// Unit quaternion packed into 32 bits ("smallest three").
///
/// The largest component is dropped and reconstructed from the unit-length
/// constraint; the remaining three are stored in 10 bits each.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Quat32(pub u32);

impl Quat32 {
    const SQRT2: f32 = std::f32::consts::SQRT_2;
    const MAX: f32 = 1023.0;

    fn pack(a: f32) -> u32 {
        ((a * Self::SQRT2 + 1.0) * 0.5 * Self::MAX)
            .round()
            .clamp(0.0, Self::MAX) as u32
    }

    fn unpack(a: u32) -> f32 {
        ((a & 0x3ff) as f32 / Self::MAX * 2.0 - 1.0) / Self::SQRT2
    }

    /// Encode a normalized quaternion.
    pub fn new(q: &Quat) -> Self {
        let c = [q.i, q.j, q.k, q.w];
        let drop = (0..4)
            .max_by(|&a, &b| c[a].abs().total_cmp(&c[b].abs()))
            .unwrap_or(3);
        let sign = if c[drop] < 0.0 { -1.0 } else { 1.0 };
        let mut bits = (drop as u32) << 30;
        let mut shift = 0;
        for (i, v) in c.iter().enumerate() {
            if i != drop {
                bits |= Self::pack(v * sign) << shift;
                shift += 10;
            }
        }
        Self(bits)
    }

    pub fn to_quat(self) -> Quat {
        let drop = (self.0 >> 30) as usize;
        let a = [
            Self::unpack(self.0),
            Self::unpack(self.0 >> 10),
            Self::unpack(self.0 >> 20),
        ];
        let missing = (1.0 - a.iter().map(|v| v * v).sum::<f32>()).max(0.0).sqrt();
        let mut c = [0.0f32; 4];
        let mut src = a.iter();
        for (i, slot) in c.iter_mut().enumerate() {
            *slot = if i == drop {
                missing
            } else {
                src.next().copied().unwrap_or(0.0)
            };
        }
        quat_from_xyzw(c[0], c[1], c[2], c[3])
    }
}

/// Convert an RGBA8 color (R in the low byte) to normalized floats.
pub fn color32_to_float4(c: u32) -> Vec4 {
    let [r, g, b, a] = c.to_le_bytes();
    Vec4::new(
        Unorm8(r).to_f32(),
        Unorm8(g).to_f32(),
        Unorm8(b).to_f32(),
        Unorm8(a).to_f32(),
    )
}

/// Inverse of [`color32_to_float4`], clamping out-of-range channels.
pub fn float4_to_color32(c: &Vec4) -> u32 {
    u32::from_le_bytes([
        Unorm8::from_f32(c.x).0,
        Unorm8::from_f32(c.y).0,
        Unorm8::from_f32(c.z).0,
        Unorm8::from_f32(c.w).0,
    ])
}

/// Point array quantized to 16 bits per component relative to its bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundedVec3Array {
    pub bound_min: Vec3,
    pub bound_max: Vec3,
    pub packed: Vec<[Unorm16; 3]>,
}

impl BoundedVec3Array {
    pub fn encode(src: &[Vec3]) -> Self {
        let Some((bound_min, bound_max)) = crate::math::min_max(src) else {
            return Self::default();
        };
        let size = bound_max - bound_min;
        let rcp = |s: f32| if s > 0.0 { 1.0 / s } else { 0.0 };
        let rsize = Vec3::new(rcp(size.x), rcp(size.y), rcp(size.z));
        let packed = src
            .iter()
            .map(|p| {
                let n = (p - bound_min).component_mul(&rsize);
                [
                    Unorm16::from_f32(n.x),
                    Unorm16::from_f32(n.y),
                    Unorm16::from_f32(n.z),
                ]
            })
            .collect();
        Self {
            bound_min,
            bound_max,
            packed,
        }
    }

    pub fn decode(&self) -> Vec<Vec3> {
        let size = self.bound_max - self.bound_min;
        self.packed
            .iter()
            .map(|[x, y, z]| {
                Vec3::new(x.to_f32(), y.to_f32(), z.to_f32()).component_mul(&size)
                    + self.bound_min
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{quat_from_rotation_x, quat_from_rotation_y, NearEqual};
    use rstest::rstest;

    #[rstest]
    #[case(-1.0, -127)]
    #[case(0.0, 0)]
    #[case(1.0, 127)]
    #[case(5.0, 127)]
    fn snorm8_clamps_and_rounds(#[case] input: f32, #[case] expected: i8) {
        assert_eq!(Snorm8::from_f32(input).0, expected);
    }

    #[test]
    fn unorm16_precision() {
        let v = Unorm16::from_f32(0.3).to_f32();
        assert!((v - 0.3).abs() < 1.0 / 65535.0);
    }

    #[test]
    fn snorm8_minimum_maps_to_minus_one() {
        assert_eq!(Snorm8(-128).to_f32(), -1.0);
    }

    #[test]
    fn tangent_keeps_sign() {
        let t = Vec4::new(0.0, 1.0, 0.0, -1.0);
        let d = decode_tangent(encode_tangent(&t));
        assert_eq!(d.w, -1.0);
        assert!((d.y - 1.0).abs() < 2.0 / 1023.0);
    }

    #[test]
    fn quat32_precision() {
        let q = quat_from_rotation_y(0.8) * quat_from_rotation_x(-0.4);
        let d = Quat32::new(&q).to_quat();
        let same = d.near_equal_eps(&q, 4e-3) || d.near_equal_eps(&-q, 4e-3);
        assert!(same, "{d:?} vs {q:?}");
    }

    #[test]
    fn color32_channels() {
        let c = float4_to_color32(&Vec4::new(1.0, 0.0, 0.5, 1.0));
        assert_eq!(c & 0xff, 255);
        assert_eq!((c >> 8) & 0xff, 0);
        assert_eq!(c >> 24, 255);
        let f = color32_to_float4(c);
        assert!((f.z - 0.5).abs() < 1.0 / 255.0);
    }

    #[test]
    fn bounded_array_is_within_quantization_error() {
        let pts = vec![
            Vec3::new(-2.0, 0.0, 10.0),
            Vec3::new(3.0, 1.0, 10.0),
            Vec3::new(0.25, 0.5, 10.0),
        ];
        let enc = BoundedVec3Array::encode(&pts);
        assert_eq!(enc.len(), 3);
        let dec = enc.decode();
        assert!(dec[..].near_equal_eps(&pts[..], 1e-3));
    }

    #[test]
    fn half_conversion() {
        let v = Vec3::new(0.5, -2.0, 1024.0);
        assert_eq!(from_half3(to_half3(&v)), v);
    }
}
