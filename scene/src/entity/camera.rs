use bitflags::bitflags;
use meshlink_core::math::{lerp, Mat4, NearEqual, Vec2};

use super::Delta;
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CameraFlags: u32 {
        const UNCHANGED = 1 << 0;
        const HAS_IS_ORTHO = 1 << 1;
        const HAS_FOV = 1 << 2;
        const HAS_NEAR_PLANE = 1 << 3;
        const HAS_FAR_PLANE = 1 << 4;
        const HAS_FOCAL_LENGTH = 1 << 5;
        const HAS_SENSOR_SIZE = 1 << 6;
        const HAS_LENS_SHIFT = 1 << 7;
        const HAS_VIEW_MATRIX = 1 << 8;
        const HAS_PROJ_MATRIX = 1 << 9;
        const HAS_LAYER_MASK = 1 << 10;
    }
}

/// Camera parameters. Zero matrices mean "derive from the transform".
#[derive(Debug, Clone, PartialEq)]
pub struct CameraData {
    pub flags: CameraFlags,
    pub is_ortho: bool,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    /// Physical camera parameters, millimeters.
    pub focal_length: f32,
    pub sensor_size: Vec2,
    pub lens_shift: Vec2,
    pub view_matrix: Mat4,
    pub proj_matrix: Mat4,
    pub layer_mask: u32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            flags: CameraFlags::empty(),
            is_ortho: false,
            fov: 60.0,
            near_plane: 0.3,
            far_plane: 1000.0,
            focal_length: 0.0,
            sensor_size: Vec2::zeros(),
            lens_shift: Vec2::zeros(),
            view_matrix: Mat4::zeros(),
            proj_matrix: Mat4::zeros(),
            layer_mask: !0,
        }
    }
}

impl CameraData {
    pub fn is_unchanged(&self) -> bool {
        self.flags.contains(CameraFlags::UNCHANGED)
    }

    fn values_near_equal(&self, other: &Self) -> bool {
        self.is_ortho == other.is_ortho
            && self.fov.near_equal(&other.fov)
            && self.near_plane.near_equal(&other.near_plane)
            && self.far_plane.near_equal(&other.far_plane)
            && self.focal_length.near_equal(&other.focal_length)
            && self.sensor_size.near_equal(&other.sensor_size)
            && self.lens_shift.near_equal(&other.lens_shift)
            && self.view_matrix.near_equal(&other.view_matrix)
            && self.proj_matrix.near_equal(&other.proj_matrix)
            && self.layer_mask == other.layer_mask
    }

    fn wire_flags(&self) -> CameraFlags {
        if self.is_unchanged() {
            return CameraFlags::UNCHANGED;
        }
        let mut flags = CameraFlags::HAS_IS_ORTHO
            | CameraFlags::HAS_FOV
            | CameraFlags::HAS_NEAR_PLANE
            | CameraFlags::HAS_FAR_PLANE;
        flags.set(CameraFlags::HAS_FOCAL_LENGTH, self.focal_length > 0.0);
        flags.set(
            CameraFlags::HAS_SENSOR_SIZE,
            self.sensor_size != Vec2::zeros(),
        );
        flags.set(CameraFlags::HAS_LENS_SHIFT, self.lens_shift != Vec2::zeros());
        flags.set(CameraFlags::HAS_VIEW_MATRIX, self.view_matrix != Mat4::zeros());
        flags.set(CameraFlags::HAS_PROJ_MATRIX, self.proj_matrix != Mat4::zeros());
        flags.set(CameraFlags::HAS_LAYER_MASK, self.layer_mask != !0);
        flags
    }
}

impl Delta for CameraData {
    fn strip(&mut self, base: &Self) {
        let same = self.values_near_equal(base);
        self.flags.set(CameraFlags::UNCHANGED, same);
    }

    fn merge(&mut self, base: &Self) {
        if self.is_unchanged() {
            let flags = self.flags;
            *self = base.clone();
            self.flags = flags;
        }
    }

    fn diff(&mut self, base: &Self) {
        let same = self.values_near_equal(base);
        self.flags.set(CameraFlags::UNCHANGED, same);
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32) {
        self.fov = lerp(&e1.fov, &e2.fov, t);
        self.near_plane = lerp(&e1.near_plane, &e2.near_plane, t);
        self.far_plane = lerp(&e1.far_plane, &e2.far_plane, t);
        self.focal_length = lerp(&e1.focal_length, &e2.focal_length, t);
        self.sensor_size = lerp(&e1.sensor_size, &e2.sensor_size, t);
        self.lens_shift = lerp(&e1.lens_shift, &e2.lens_shift, t);
    }
}

impl Encode for CameraData {
    fn encode(&self, w: &mut Writer) {
        let flags = self.wire_flags();
        w.write_u32(flags.bits());
        if flags.contains(CameraFlags::UNCHANGED) {
            return;
        }
        w.write_bool(self.is_ortho);
        w.write_f32(self.fov);
        w.write_f32(self.near_plane);
        w.write_f32(self.far_plane);
        if flags.contains(CameraFlags::HAS_FOCAL_LENGTH) {
            w.write_f32(self.focal_length);
        }
        if flags.contains(CameraFlags::HAS_SENSOR_SIZE) {
            w.write_pod(&self.sensor_size);
        }
        if flags.contains(CameraFlags::HAS_LENS_SHIFT) {
            w.write_pod(&self.lens_shift);
        }
        if flags.contains(CameraFlags::HAS_VIEW_MATRIX) {
            w.write_pod(&self.view_matrix);
        }
        if flags.contains(CameraFlags::HAS_PROJ_MATRIX) {
            w.write_pod(&self.proj_matrix);
        }
        if flags.contains(CameraFlags::HAS_LAYER_MASK) {
            w.write_u32(self.layer_mask);
        }
    }
}

impl Decode for CameraData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = CameraFlags::from_bits_truncate(r.read_u32()?);
        let mut data = Self {
            flags: flags & CameraFlags::UNCHANGED,
            ..Self::default()
        };
        if data.is_unchanged() {
            return Ok(data);
        }
        if flags.contains(CameraFlags::HAS_IS_ORTHO) {
            data.is_ortho = r.read_bool()?;
        }
        if flags.contains(CameraFlags::HAS_FOV) {
            data.fov = r.read_f32()?;
        }
        if flags.contains(CameraFlags::HAS_NEAR_PLANE) {
            data.near_plane = r.read_f32()?;
        }
        if flags.contains(CameraFlags::HAS_FAR_PLANE) {
            data.far_plane = r.read_f32()?;
        }
        if flags.contains(CameraFlags::HAS_FOCAL_LENGTH) {
            data.focal_length = r.read_f32()?;
        }
        if flags.contains(CameraFlags::HAS_SENSOR_SIZE) {
            data.sensor_size = r.read_pod()?;
        }
        if flags.contains(CameraFlags::HAS_LENS_SHIFT) {
            data.lens_shift = r.read_pod()?;
        }
        if flags.contains(CameraFlags::HAS_VIEW_MATRIX) {
            data.view_matrix = r.read_pod()?;
        }
        if flags.contains(CameraFlags::HAS_PROJ_MATRIX) {
            data.proj_matrix = r.read_pod()?;
        }
        if flags.contains(CameraFlags::HAS_LAYER_MASK) {
            data.layer_mask = r.read_u32()?;
        }
        Ok(data)
    }
}
