//! Side tables sent with a scene: constraints, instancing and custom
//! properties.

use meshlink_core::math::{Mat4, Quat, Vec3};
use meshlink_core::SharedVec;

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ConstraintType {
    Aim = 1,
    Parent = 2,
    Position = 3,
    Rotation = 4,
    Scale = 5,
}

impl ConstraintType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Aim),
            2 => Some(Self::Parent),
            3 => Some(Self::Position),
            4 => Some(Self::Rotation),
            5 => Some(Self::Scale),
            _ => None,
        }
    }
}

/// Offset of a parent constraint source.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParentSource {
    pub position_offset: Vec3,
    pub rotation_offset: Quat,
}

impl Default for ParentSource {
    fn default() -> Self {
        Self {
            position_offset: Vec3::zeros(),
            rotation_offset: Quat::identity(),
        }
    }
}

/// Drives the entity at `path` from the entities at `source_paths`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub constraint_type: ConstraintType,
    pub path: String,
    pub source_paths: Vec<String>,
    /// One entry per source for [`ConstraintType::Parent`], empty otherwise.
    pub parent_sources: SharedVec<ParentSource>,
}

impl Constraint {
    pub fn new(constraint_type: ConstraintType, path: impl Into<String>) -> Self {
        Self {
            constraint_type,
            path: path.into(),
            source_paths: Vec::new(),
            parent_sources: SharedVec::new(),
        }
    }
}

impl Encode for Constraint {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.constraint_type as u32);
        w.write_str(&self.path);
        w.write_strings(&self.source_paths);
        if self.constraint_type == ConstraintType::Parent {
            w.write_slice(&self.parent_sources);
        }
    }
}

impl Decode for Constraint {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let tag = r.read_u32()?;
        let constraint_type = ConstraintType::from_u32(tag).ok_or(DecodeError::UnknownEnum {
            name: "ConstraintType",
            value: tag,
        })?;
        let path = r.read_string()?;
        let source_paths = r.read_strings()?;
        let parent_sources = if constraint_type == ConstraintType::Parent {
            r.read_shared()?
        } else {
            SharedVec::new()
        };
        Ok(Self {
            constraint_type,
            path,
            source_paths,
            parent_sources,
        })
    }
}

/// Instances of the mesh at `path`, placed under `parent_path`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceInfo {
    pub path: String,
    pub parent_path: String,
    /// One local matrix per instance.
    pub transforms: SharedVec<Mat4>,
}

impl Encode for InstanceInfo {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.path);
        w.write_str(&self.parent_path);
        w.write_slice(&self.transforms);
    }
}

impl Decode for InstanceInfo {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            path: r.read_string()?,
            parent_path: r.read_string()?,
            transforms: r.read_shared()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum PropertySource {
    /// Input of a procedural node modifier.
    #[default]
    GeometryNodes = 0,
    CustomProperty = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    String(String),
}

/// A user-editable property exposed by the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub path: String,
    pub name: String,
    pub modifier_name: String,
    pub property_name: String,
    pub source: PropertySource,
    pub value: PropertyValue,
    pub min: f32,
    pub max: f32,
}

impl Encode for PropertyInfo {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.path);
        w.write_str(&self.name);
        w.write_str(&self.modifier_name);
        w.write_str(&self.property_name);
        w.write_u32(self.source as u32);
        match &self.value {
            PropertyValue::Int(v) => {
                w.write_u32(0);
                w.write_i32(*v);
            }
            PropertyValue::Float(v) => {
                w.write_u32(1);
                w.write_f32(*v);
            }
            PropertyValue::IntArray(v) => {
                w.write_u32(2);
                w.write_slice(v);
            }
            PropertyValue::FloatArray(v) => {
                w.write_u32(3);
                w.write_slice(v);
            }
            PropertyValue::String(v) => {
                w.write_u32(4);
                w.write_str(v);
            }
        }
        w.write_f32(self.min);
        w.write_f32(self.max);
    }
}

impl Decode for PropertyInfo {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let path = r.read_string()?;
        let name = r.read_string()?;
        let modifier_name = r.read_string()?;
        let property_name = r.read_string()?;
        let source = match r.read_u32()? {
            0 => PropertySource::GeometryNodes,
            1 => PropertySource::CustomProperty,
            value => {
                return Err(DecodeError::UnknownEnum {
                    name: "PropertySource",
                    value,
                })
            }
        };
        let value = match r.read_u32()? {
            0 => PropertyValue::Int(r.read_i32()?),
            1 => PropertyValue::Float(r.read_f32()?),
            2 => PropertyValue::IntArray(r.read_vec()?),
            3 => PropertyValue::FloatArray(r.read_vec()?),
            4 => PropertyValue::String(r.read_string()?),
            value => {
                return Err(DecodeError::UnknownEnum {
                    name: "PropertyValue",
                    value,
                })
            }
        };
        Ok(Self {
            path,
            name,
            modifier_name,
            property_name,
            source,
            value,
            min: r.read_f32()?,
            max: r.read_f32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn round_trip<T: Encode + Decode>(value: &T) -> T {
        let mut w = Writer::new();
        value.encode(&mut w);
        T::decode(&mut Reader::new(Arc::from(w.into_bytes()))).unwrap()
    }

    #[test]
    fn parent_sources_only_travel_with_parent_constraints() {
        let mut aim = Constraint::new(ConstraintType::Aim, "/cam");
        aim.source_paths.push("/target".into());
        aim.parent_sources = vec![ParentSource::default()].into();
        let back = round_trip(&aim);
        assert_eq!(back.source_paths, ["/target"]);
        assert!(back.parent_sources.is_empty());

        let mut parent = Constraint::new(ConstraintType::Parent, "/hand/cup");
        parent.source_paths.push("/hand".into());
        parent.parent_sources = vec![ParentSource::default()].into();
        assert_eq!(round_trip(&parent), parent);
    }

    #[test]
    fn property_info_values() {
        for value in [
            PropertyValue::Int(3),
            PropertyValue::FloatArray(vec![0.5, 1.5]),
            PropertyValue::String("seed".into()),
        ] {
            let info = PropertyInfo {
                path: "/terrain".into(),
                name: "Input".into(),
                modifier_name: "GeometryNodes".into(),
                property_name: "Input_2".into(),
                source: PropertySource::GeometryNodes,
                value,
                min: 0.0,
                max: 10.0,
            };
            assert_eq!(round_trip(&info), info);
        }
    }

    #[test]
    fn instance_transforms_are_shared_views() {
        let info = InstanceInfo {
            path: "/tree".into(),
            parent_path: "/forest".into(),
            transforms: vec![Mat4::identity(); 3].into(),
        };
        let back = round_trip(&info);
        assert_eq!(back, info);
        assert!(back.transforms.is_borrowed());
    }
}
