use bitflags::bitflags;
use meshlink_core::math::{lerp, NearEqual, Vec4};

use super::Delta;
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u32 {
        const UNCHANGED = 1 << 0;
        const HAS_LIGHT_TYPE = 1 << 1;
        const HAS_SHADOW_TYPE = 1 << 2;
        const HAS_COLOR = 1 << 3;
        const HAS_INTENSITY = 1 << 4;
        const HAS_RANGE = 1 << 5;
        const HAS_SPOT_ANGLE = 1 << 6;
        const HAS_LAYER_MASK = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum LightType {
    #[default]
    Unknown = -1,
    Spot = 0,
    Directional = 1,
    Point = 2,
    Area = 3,
}

impl LightType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            -1 => Some(Self::Unknown),
            0 => Some(Self::Spot),
            1 => Some(Self::Directional),
            2 => Some(Self::Point),
            3 => Some(Self::Area),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ShadowType {
    #[default]
    Unknown = -1,
    None = 0,
    Hard = 1,
    Soft = 2,
}

impl ShadowType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            -1 => Some(Self::Unknown),
            0 => Some(Self::None),
            1 => Some(Self::Hard),
            2 => Some(Self::Soft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightData {
    pub flags: LightFlags,
    pub light_type: LightType,
    pub shadow_type: ShadowType,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    /// Full cone angle in degrees.
    pub spot_angle: f32,
    pub layer_mask: u32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            flags: LightFlags::empty(),
            light_type: LightType::Unknown,
            shadow_type: ShadowType::Unknown,
            color: Vec4::repeat(1.0),
            intensity: 1.0,
            range: 0.0,
            spot_angle: 30.0,
            layer_mask: !0,
        }
    }
}

impl LightData {
    pub fn is_unchanged(&self) -> bool {
        self.flags.contains(LightFlags::UNCHANGED)
    }

    fn values_near_equal(&self, other: &Self) -> bool {
        self.light_type == other.light_type
            && self.shadow_type == other.shadow_type
            && self.color.near_equal(&other.color)
            && self.intensity.near_equal(&other.intensity)
            && self.range.near_equal(&other.range)
            && self.spot_angle.near_equal(&other.spot_angle)
            && self.layer_mask == other.layer_mask
    }

    fn wire_flags(&self) -> LightFlags {
        if self.is_unchanged() {
            return LightFlags::UNCHANGED;
        }
        let mut flags = LightFlags::HAS_COLOR | LightFlags::HAS_INTENSITY;
        flags.set(LightFlags::HAS_LIGHT_TYPE, self.light_type != LightType::Unknown);
        flags.set(
            LightFlags::HAS_SHADOW_TYPE,
            self.shadow_type != ShadowType::Unknown,
        );
        flags.set(LightFlags::HAS_RANGE, self.range > 0.0);
        flags.set(
            LightFlags::HAS_SPOT_ANGLE,
            self.light_type == LightType::Spot,
        );
        flags.set(LightFlags::HAS_LAYER_MASK, self.layer_mask != !0);
        flags
    }
}

impl Delta for LightData {
    fn strip(&mut self, base: &Self) {
        let same = self.values_near_equal(base);
        self.flags.set(LightFlags::UNCHANGED, same);
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
        self.flags.set(LightFlags::UNCHANGED, same);
    }

    fn lerp(&mut self, e1: &Self, e2: &Self, t: f32) {
        self.color = lerp(&e1.color, &e2.color, t);
        self.intensity = lerp(&e1.intensity, &e2.intensity, t);
        self.range = lerp(&e1.range, &e2.range, t);
        self.spot_angle = lerp(&e1.spot_angle, &e2.spot_angle, t);
    }
}

impl Encode for LightData {
    fn encode(&self, w: &mut Writer) {
        let flags = self.wire_flags();
        w.write_u32(flags.bits());
        if flags.contains(LightFlags::UNCHANGED) {
            return;
        }
        if flags.contains(LightFlags::HAS_LIGHT_TYPE) {
            w.write_i32(self.light_type as i32);
        }
        if flags.contains(LightFlags::HAS_SHADOW_TYPE) {
            w.write_i32(self.shadow_type as i32);
        }
        w.write_pod(&self.color);
        w.write_f32(self.intensity);
        if flags.contains(LightFlags::HAS_RANGE) {
            w.write_f32(self.range);
        }
        if flags.contains(LightFlags::HAS_SPOT_ANGLE) {
            w.write_f32(self.spot_angle);
        }
        if flags.contains(LightFlags::HAS_LAYER_MASK) {
            w.write_u32(self.layer_mask);
        }
    }
}

impl Decode for LightData {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = LightFlags::from_bits_truncate(r.read_u32()?);
        let mut data = Self {
            flags: flags & LightFlags::UNCHANGED,
            ..Self::default()
        };
        if data.is_unchanged() {
            return Ok(data);
        }
        if flags.contains(LightFlags::HAS_LIGHT_TYPE) {
            let v = r.read_i32()?;
            data.light_type = LightType::from_i32(v).ok_or(DecodeError::UnknownEnum {
                name: "LightType",
                value: v as u32,
            })?;
        }
        if flags.contains(LightFlags::HAS_SHADOW_TYPE) {
            let v = r.read_i32()?;
            data.shadow_type = ShadowType::from_i32(v).ok_or(DecodeError::UnknownEnum {
                name: "ShadowType",
                value: v as u32,
            })?;
        }
        if flags.contains(LightFlags::HAS_COLOR) {
            data.color = r.read_pod()?;
        }
        if flags.contains(LightFlags::HAS_INTENSITY) {
            data.intensity = r.read_f32()?;
        }
        if flags.contains(LightFlags::HAS_RANGE) {
            data.range = r.read_f32()?;
        }
        if flags.contains(LightFlags::HAS_SPOT_ANGLE) {
            data.spot_angle = r.read_f32()?;
        }
        if flags.contains(LightFlags::HAS_LAYER_MASK) {
            data.layer_mask = r.read_u32()?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unknown_light_type_is_rejected() {
        let mut w = Writer::new();
        w.write_u32(LightFlags::HAS_LIGHT_TYPE.bits());
        w.write_i32(42);
        let err = LightData::decode(&mut Reader::new(Arc::from(w.into_bytes())));
        assert!(matches!(
            err,
            Err(DecodeError::UnknownEnum { name: "LightType", value: 42 })
        ));
    }

    #[test]
    fn spot_light_round_trip() {
        let light = LightData {
            light_type: LightType::Spot,
            shadow_type: ShadowType::Soft,
            range: 12.0,
            spot_angle: 45.0,
            ..Default::default()
        };
        let mut w = Writer::new();
        light.encode(&mut w);
        let decoded = LightData::decode(&mut Reader::new(Arc::from(w.into_bytes()))).unwrap();
        assert_eq!(decoded, light);
    }
}
