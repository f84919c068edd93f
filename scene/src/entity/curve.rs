use bitflags::bitflags;
use meshlink_core::math::{NearEqual, Vec3};
use meshlink_core::SharedVec;

use super::{lerp_array, Delta};
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CurveFlags: u32 {
        const UNCHANGED = 1 << 0;
        /// Same spline count, closure and control point counts as the base.
        const TOPOLOGY_UNCHANGED = 1 << 1;
    }
}

/// One Bezier spline: control points with their left and right handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplineData {
    pub closed: bool,
    pub cos: SharedVec<Vec3>,
    pub handles_left: SharedVec<Vec3>,
    pub handles_right: SharedVec<Vec3>,
}

impl SplineData {
    fn same_shape(&self, other: &Self) -> bool {
        self.closed == other.closed
            && self.cos.len() == other.cos.len()
            && self.handles_left.len() == other.handles_left.len()
            && self.handles_right.len() == other.handles_right.len()
    }

    fn near_equal(&self, other: &Self) -> bool {
        self.closed == other.closed
            && self.cos.near_equal(&other.cos)
            && self.handles_left.near_equal(&other.handles_left)
            && self.handles_right.near_equal(&other.handles_right)
    }

    /// Applies `f` to every control point and handle.
    pub fn map_points(&mut self, f: impl Fn(Vec3) -> Vec3) {
        for array in [&mut self.cos, &mut self.handles_left, &mut self.handles_right] {
            for p in array.make_mut().iter_mut() {
                *p = f(*p);
            }
        }
    }
}

impl Encode for SplineData {
    fn encode(&self, w: &mut Writer) {
        w.write_bool(self.closed);
        w.write_slice(&self.cos);
        w.write_slice(&self.handles_left);
        w.write_slice(&self.handles_right);
    }
}

impl Decode for SplineData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            closed: r.read_bool()?,
            cos: r.read_shared()?,
            handles_left: r.read_shared()?,
            handles_right: r.read_shared()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveData {
    pub flags: CurveFlags,
    pub splines: Vec<SplineData>,
}

impl CurveData {
    pub fn is_unchanged(&self) -> bool {
        self.flags.contains(CurveFlags::UNCHANGED)
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.splines.len() == other.splines.len()
            && self
                .splines
                .iter()
                .zip(&other.splines)
                .all(|(a, b)| a.same_shape(b))
    }

    fn set_change_flags(&mut self, base: &Self) {
        let topology = self.same_shape(base);
        let unchanged = topology
            && self
                .splines
                .iter()
                .zip(&base.splines)
                .all(|(a, b)| a.near_equal(b));
        self.flags.set(CurveFlags::TOPOLOGY_UNCHANGED, topology);
        self.flags.set(CurveFlags::UNCHANGED, unchanged);
    }
}

impl Delta for CurveData {
    fn strip(&mut self, base: &Self) {
        self.set_change_flags(base);
        if self.is_unchanged() {
            self.splines.clear();
        }
    }

    fn merge(&mut self, base: &Self) {
        if self.is_unchanged() {
            self.splines = base.splines.clone();
        }
    }

    fn diff(&mut self, base: &Self) {
        self.set_change_flags(base);
    }

    fn can_lerp(e1: &Self, e2: &Self) -> bool {
        e1.same_shape(e2)
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32) {
        self.splines = e1
            .splines
            .iter()
            .zip(&e2.splines)
            .map(|(a, b)| SplineData {
                closed: a.closed,
                cos: lerp_array(&a.cos, &b.cos, t),
                handles_left: lerp_array(&a.handles_left, &b.handles_left, t),
                handles_right: lerp_array(&a.handles_right, &b.handles_right, t),
            })
            .collect();
    }
}

impl Encode for CurveData {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.flags.bits());
        if self.is_unchanged() {
            return;
        }
        w.write_seq(&self.splines);
    }
}

impl Decode for CurveData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = CurveFlags::from_bits_truncate(r.read_u32()?);
        let splines = if flags.contains(CurveFlags::UNCHANGED) {
            Vec::new()
        } else {
            r.read_seq()?
        };
        Ok(Self { flags, splines })
    }
}
