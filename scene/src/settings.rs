//! Coordinate-system description and import configuration.
//!
//! [`SceneSettings`] travels with every scene and describes the sender's
//! coordinate system. [`ImportSettings`] is local receiver policy. Both can
//! be loaded from a TOML file through [`ConversionSettings`]:
//!
//! ```toml
//! [scene]
//! handedness = "right_z_up"
//! scale_factor = 100.0
//!
//! [import]
//! zup_correction = "rotate_x"
//! mesh_split_unit = 65000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Handedness and up axis of a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum Handedness {
    /// Left handed, Y up. This is the canonical receiver space.
    #[default]
    Left = 0,
    Right = 1,
    LeftZUp = 2,
    RightZUp = 3,
}

impl Handedness {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            2 => Some(Self::LeftZUp),
            3 => Some(Self::RightZUp),
            _ => None,
        }
    }

    /// `true` if converting to [`Handedness::Left`] mirrors the X axis.
    pub fn flips_x(self) -> bool {
        matches!(self, Self::Right | Self::RightZUp)
    }

    /// `true` if converting to [`Handedness::Left`] needs an up-axis fix.
    pub fn is_z_up(self) -> bool {
        matches!(self, Self::LeftZUp | Self::RightZUp)
    }
}

/// Strategy used to bring Z-up content into Y-up space.
///
/// The two strategies give different results on hierarchies with
/// non-uniform scale, so a consumer has to pick the one it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZUpCorrection {
    /// Swap Y and Z and negate the new Z on every spatial quantity.
    #[default]
    #[serde(rename = "flip_yz")]
    FlipYZ,
    /// Rotate root transforms and root animations only.
    RotateX,
}

/// Sender's coordinate system, serialized with the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub name: String,
    pub handedness: Handedness,
    pub scale_factor: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            handedness: Handedness::Left,
            scale_factor: 1.0,
        }
    }
}

/// Receiver policy applied by [`Scene::import`](crate::Scene::import).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub zup_correction: ZUpCorrection,
    /// Maximum vertex count per mesh split. `0` disables splitting.
    pub mesh_split_unit: u32,
    /// `4` for fixed four-bone skinning, `255` for variable influences.
    pub mesh_max_bone_influence: u32,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            zup_correction: ZUpCorrection::FlipYZ,
            mesh_split_unit: 65000,
            mesh_max_bone_influence: 4,
        }
    }
}

/// Both halves of the conversion configuration, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub scene: SceneSettings,
    pub import: ImportSettings,
}

impl ConversionSettings {
    /// Parses settings from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        log::info!(
            "loaded conversion settings from {}: {:?}, scale {}, {:?}",
            path.display(),
            settings.scene.handedness,
            settings.scene.scale_factor,
            settings.import.zup_correction
        );
        Ok(settings)
    }

    /// Loads settings, falling back to defaults if the file is missing or
    /// malformed.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("no conversion settings ({e}), using defaults");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = ConversionSettings::from_toml_str("").unwrap();
        assert_eq!(settings, ConversionSettings::default());
        assert_eq!(settings.import.mesh_split_unit, 65000);
        assert_eq!(settings.scene.scale_factor, 1.0);
    }

    #[test]
    fn parses_partial_document() {
        let settings = ConversionSettings::from_toml_str(
            r#"
            [scene]
            handedness = "right_z_up"
            scale_factor = 100.0

            [import]
            zup_correction = "rotate_x"
            "#,
        )
        .unwrap();
        assert_eq!(settings.scene.handedness, Handedness::RightZUp);
        assert_eq!(settings.scene.scale_factor, 100.0);
        assert_eq!(settings.import.zup_correction, ZUpCorrection::RotateX);
        assert_eq!(settings.import.mesh_max_bone_influence, 4);
    }

    #[test]
    fn rejects_unknown_handedness() {
        let err = ConversionSettings::from_toml_str("[scene]\nhandedness = \"up\"\n");
        assert!(matches!(err, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn missing_file_falls_back() {
        let settings = ConversionSettings::load_or_default(Path::new("/nonexistent/meshlink.toml"));
        assert_eq!(settings, ConversionSettings::default());
    }

    #[test]
    fn handedness_axes() {
        assert!(Handedness::RightZUp.flips_x());
        assert!(Handedness::RightZUp.is_z_up());
        assert!(!Handedness::LeftZUp.flips_x());
        assert!(!Handedness::Right.is_z_up());
        assert_eq!(Handedness::from_u32(3), Some(Handedness::RightZUp));
        assert_eq!(Handedness::from_u32(9), None);
    }
}
