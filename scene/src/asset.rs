//! Non-entity scene payloads: materials, textures and animation clips.
//!
//! Assets are addressed by id. Meshes reference materials through
//! `material_ids`, materials reference textures through [`TextureRef`].

use meshlink_core::math::{Mat4, Vec2, Vec4};
use meshlink_core::SharedVec;

use crate::animation::AnimationClip;
use crate::codec::{Decode, Encode, Reader, Writer};
use crate::entity::INVALID_ID;
use crate::error::DecodeError;

/// Reference to a texture asset with an optional UV transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureRef {
    pub id: i32,
    pub scale: Vec2,
    pub offset: Vec2,
}

impl TextureRef {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            scale: Vec2::new(1.0, 1.0),
            offset: Vec2::zeros(),
        }
    }
}

/// A typed material property value.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialValue {
    Int(i32),
    Float(f32),
    Vector(Vec4),
    Matrix(Mat4),
    Texture(TextureRef),
}

/// A named shader property.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperty {
    pub name: String,
    pub value: MaterialValue,
}

impl Encode for MaterialProperty {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.name);
        match &self.value {
            MaterialValue::Int(v) => {
                w.write_u32(1);
                w.write_i32(*v);
            }
            MaterialValue::Float(v) => {
                w.write_u32(2);
                w.write_f32(*v);
            }
            MaterialValue::Vector(v) => {
                w.write_u32(3);
                w.write_pod(v);
            }
            MaterialValue::Matrix(v) => {
                w.write_u32(4);
                w.write_pod(v);
            }
            MaterialValue::Texture(t) => {
                w.write_u32(5);
                w.write_i32(t.id);
                w.write_pod(&t.scale);
                w.write_pod(&t.offset);
            }
        }
    }
}

impl Decode for MaterialProperty {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let name = r.read_string()?;
        let value = match r.read_u32()? {
            1 => MaterialValue::Int(r.read_i32()?),
            2 => MaterialValue::Float(r.read_f32()?),
            3 => MaterialValue::Vector(r.read_pod()?),
            4 => MaterialValue::Matrix(r.read_pod()?),
            5 => MaterialValue::Texture(TextureRef {
                id: r.read_i32()?,
                scale: r.read_pod()?,
                offset: r.read_pod()?,
            }),
            value => {
                return Err(DecodeError::UnknownEnum {
                    name: "MaterialValue",
                    value,
                })
            }
        };
        Ok(Self { name, value })
    }
}

/// Shader plus property list.
///
/// `index` is the slot that mesh `material_ids` refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: i32,
    pub name: String,
    pub index: i32,
    pub shader: String,
    pub properties: Vec<MaterialProperty>,
    pub keywords: Vec<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            name: String::new(),
            index: 0,
            shader: String::new(),
            properties: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

impl Material {
    pub const COLOR: &'static str = "_Color";
    pub const MAIN_TEX: &'static str = "_MainTex";

    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: MaterialValue) -> Self {
        self.set_property(name, value);
        self
    }

    #[must_use]
    pub fn with_color(self, color: Vec4) -> Self {
        self.with_property(Self::COLOR, MaterialValue::Vector(color))
    }

    /// Adds or replaces a property.
    pub fn set_property(&mut self, name: impl Into<String>, value: MaterialValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(p) => p.value = value,
            None => self.properties.push(MaterialProperty { name, value }),
        }
    }

    pub fn property(&self, name: &str) -> Option<&MaterialValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn color(&self) -> Option<Vec4> {
        match self.property(Self::COLOR)? {
            MaterialValue::Vector(c) => Some(*c),
            _ => None,
        }
    }

    /// Ids of every texture this material samples.
    pub fn texture_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.properties.iter().filter_map(|p| match p.value {
            MaterialValue::Texture(t) => Some(t.id),
            _ => None,
        })
    }
}

impl Encode for Material {
    fn encode(&self, w: &mut Writer) {
        w.write_i32(self.id);
        w.write_str(&self.name);
        w.write_i32(self.index);
        w.write_str(&self.shader);
        w.write_seq(&self.properties);
        w.write_strings(&self.keywords);
    }
}

impl Decode for Material {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        Ok(Self {
            id: r.read_i32()?,
            name: r.read_string()?,
            index: r.read_i32()?,
            shader: r.read_string()?,
            properties: r.read_seq()?,
            keywords: r.read_strings()?,
        })
    }
}

/// Channel count in the low nibble, component type in the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum TextureFormat {
    #[default]
    Unknown = 0,
    Rf16 = 0x11,
    RGf16 = 0x12,
    RGBf16 = 0x13,
    RGBAf16 = 0x14,
    Rf32 = 0x21,
    RGf32 = 0x22,
    RGBf32 = 0x23,
    RGBAf32 = 0x24,
    Ru8 = 0x31,
    RGu8 = 0x32,
    RGBu8 = 0x33,
    RGBAu8 = 0x34,
    /// `data` is an encoded image file; the texture name is its file name.
    RawFile = 0x100,
}

impl TextureFormat {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Unknown,
            0x11 => Self::Rf16,
            0x12 => Self::RGf16,
            0x13 => Self::RGBf16,
            0x14 => Self::RGBAf16,
            0x21 => Self::Rf32,
            0x22 => Self::RGf32,
            0x23 => Self::RGBf32,
            0x24 => Self::RGBAf32,
            0x31 => Self::Ru8,
            0x32 => Self::RGu8,
            0x33 => Self::RGBu8,
            0x34 => Self::RGBAu8,
            0x100 => Self::RawFile,
            _ => return None,
        })
    }

    /// Bytes per pixel, `0` for unknown and raw file formats.
    pub fn pixel_size(self) -> usize {
        let v = self as u32;
        if v >= 0x100 {
            return 0;
        }
        let channels = (v & 0xF) as usize;
        let component = match v >> 4 {
            1 => 2,
            2 => 4,
            3 => 1,
            _ => 0,
        };
        channels * component
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum TextureType {
    #[default]
    Default = 0,
    NormalMap = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: i32,
    pub name: String,
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub data: SharedVec<u8>,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            name: String::new(),
            texture_type: TextureType::Default,
            format: TextureFormat::Unknown,
            width: 0,
            height: 0,
            data: SharedVec::new(),
        }
    }
}

impl Texture {
    /// Expected byte size of `data` for raw pixel formats.
    pub fn expected_size(&self) -> Option<usize> {
        match self.format.pixel_size() {
            0 => None,
            px => Some(px * self.width as usize * self.height as usize),
        }
    }
}

impl Encode for Texture {
    fn encode(&self, w: &mut Writer) {
        w.write_i32(self.id);
        w.write_str(&self.name);
        w.write_u32(self.texture_type as u32);
        w.write_u32(self.format as u32);
        w.write_u32(self.width);
        w.write_u32(self.height);
        w.write_slice(&self.data);
    }
}

impl Decode for Texture {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let id = r.read_i32()?;
        let name = r.read_string()?;
        let texture_type = match r.read_u32()? {
            0 => TextureType::Default,
            1 => TextureType::NormalMap,
            value => {
                return Err(DecodeError::UnknownEnum {
                    name: "TextureType",
                    value,
                })
            }
        };
        let raw_format = r.read_u32()?;
        let format = TextureFormat::from_u32(raw_format).ok_or(DecodeError::UnknownEnum {
            name: "TextureFormat",
            value: raw_format,
        })?;
        Ok(Self {
            id,
            name,
            texture_type,
            format,
            width: r.read_u32()?,
            height: r.read_u32()?,
            data: r.read_shared()?,
        })
    }
}

/// Wire tag of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AssetType {
    Material = 1,
    Texture = 2,
    Animation = 3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    Material(Material),
    Texture(Texture),
    Animation(AnimationClip),
}

impl Asset {
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Material(_) => AssetType::Material,
            Self::Texture(_) => AssetType::Texture,
            Self::Animation(_) => AssetType::Animation,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::Material(m) => m.id,
            Self::Texture(t) => t.id,
            Self::Animation(a) => a.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Material(m) => &m.name,
            Self::Texture(t) => &t.name,
            Self::Animation(a) => &a.name,
        }
    }

    pub fn name_mut(&mut self) -> &mut String {
        match self {
            Self::Material(m) => &mut m.name,
            Self::Texture(t) => &mut t.name,
            Self::Animation(a) => &mut a.name,
        }
    }
}

impl Encode for Asset {
    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.asset_type() as u32);
        match self {
            Self::Material(m) => m.encode(w),
            Self::Texture(t) => t.encode(w),
            Self::Animation(a) => a.encode(w),
        }
    }
}

impl Decode for Asset {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        match r.read_u32()? {
            1 => Ok(Self::Material(Material::decode(r)?)),
            2 => Ok(Self::Texture(Texture::decode(r)?)),
            3 => Ok(Self::Animation(AnimationClip::decode(r)?)),
            tag => Err(DecodeError::UnknownAssetType(tag)),
        }
    }
}
