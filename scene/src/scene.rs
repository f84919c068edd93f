//! The scene container and its wire form.
//!
//! A [`Scene`] owns every entity, asset and side table of one sync message.
//! Delta operators run per entity in parallel batches; the binary form is
//! an 8-byte content hash, a section-presence word and the present sections
//! in fixed order:
//!
//! ```text
//! u64 hash | u32 flags | settings | assets | entities | constraints
//!          | instance infos | property infos | instance meshes
//! ```
//!
//! The hash covers everything after itself and is verified on decode.

use std::sync::Arc;

use bitflags::bitflags;
use meshlink_core::parallel::{par_for_each_mut, par_map, ParConfig};
use meshlink_core::{profile_function, profile_scope};
use parking_lot::Mutex;

use crate::asset::Asset;
use crate::codec::{content_hash, Codec, Decode, Encode, Reader, Writer};
use crate::convert::{build_converters, convert_animation, convert_entity, EntityConverter};
use crate::entity::{Entity, EntityKind, EntityType, RefineFlags};
use crate::error::{DecodeError, EntityError, ImportError};
use crate::info::{Constraint, InstanceInfo, PropertyInfo};
use crate::settings::{Handedness, ImportSettings, SceneSettings};

bitflags! {
    /// Which sections follow in an encoded scene.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneDataFlags: u32 {
        const HAS_SETTINGS = 1 << 0;
        const HAS_ASSETS = 1 << 1;
        const HAS_ENTITIES = 1 << 2;
        const HAS_CONSTRAINTS = 1 << 3;
        const HAS_INSTANCE_INFOS = 1 << 4;
        const HAS_PROPERTY_INFOS = 1 << 5;
        const HAS_INSTANCE_MESHES = 1 << 6;
    }
}

impl Encode for SceneSettings {
    fn encode(&self, w: &mut Writer) {
        w.write_str(&self.name);
        w.write_u32(self.handedness as u32);
        w.write_f32(self.scale_factor);
    }
}

impl Decode for SceneSettings {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError> {
        let name = r.read_string()?;
        let raw = r.read_u32()?;
        let handedness = Handedness::from_u32(raw).ok_or(DecodeError::UnknownEnum {
            name: "Handedness",
            value: raw,
        })?;
        Ok(Self {
            name,
            handedness,
            scale_factor: r.read_f32()?,
        })
    }
}

/// Replaces path separators so asset names stay single path components.
pub fn sanitize_object_name(name: &mut String) {
    if name.contains(['/', '\\']) {
        *name = name.replace(['/', '\\'], "_");
    }
}

/// Keeps `/` as the hierarchy separator; backslashes become part of the
/// component they appear in instead of splitting it.
pub fn sanitize_hierarchy_path(path: &mut String) {
    if path.contains('\\') {
        *path = path.replace('\\', "_");
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub settings: SceneSettings,
    pub assets: Vec<Asset>,
    pub entities: Vec<Entity>,
    pub constraints: Vec<Constraint>,
    pub instance_infos: Vec<InstanceInfo>,
    pub property_infos: Vec<PropertyInfo>,
    /// Meshes referenced only by instance infos.
    pub instance_meshes: Vec<Entity>,

    /// Batching of per-entity work. Not serialized.
    pub parallel: ParConfig,
}

/// Runs `f` over index-paired entities of two equally long lists,
/// collecting the first error.
fn paired<F>(
    entities: &mut [Entity],
    base: &[Entity],
    config: &ParConfig,
    f: F,
) -> Result<(), EntityError>
where
    F: Fn(&mut Entity, &Entity) -> Result<(), EntityError> + Sync,
{
    if entities.len() != base.len() {
        return Err(EntityError::CountMismatch {
            left: entities.len(),
            right: base.len(),
        });
    }
    let first_error = Mutex::new(None);
    par_for_each_mut(entities, config, |i, e| {
        let b = &base[i];
        // Entities that no longer pair up are sent in full.
        if e.id != b.id {
            return;
        }
        if let Err(err) = f(e, b) {
            first_error.lock().get_or_insert(err);
        }
    });
    match first_error.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SceneSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: ParConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn clear(&mut self) {
        let parallel = std::mem::take(&mut self.parallel);
        *self = Self {
            parallel,
            ..Self::default()
        };
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
            && self.entities.is_empty()
            && self.constraints.is_empty()
            && self.instance_infos.is_empty()
            && self.property_infos.is_empty()
            && self.instance_meshes.is_empty()
    }

    /// Appends everything in `other`; `other`'s settings win.
    pub fn concat(&mut self, other: Scene) {
        self.settings = other.settings;
        self.assets.extend(other.assets);
        self.entities.extend(other.entities);
        self.constraints.extend(other.constraints);
        self.instance_infos.extend(other.instance_infos);
        self.property_infos.extend(other.property_infos);
        self.instance_meshes.extend(other.instance_meshes);
    }

    pub fn find_entity(&self, path: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.path == path)
    }

    pub fn find_entity_mut(&mut self, path: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.path == path)
    }

    pub fn entity_by_id(&self, id: i32) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entities_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |e| e.entity_type() == entity_type)
    }

    /// Total vertex count of mesh and points entities.
    pub fn vertex_count(&self) -> usize {
        self.entities
            .iter()
            .map(|e| match &e.kind {
                EntityKind::Mesh(m) => m.points.len(),
                EntityKind::Points(p) => p.points.len(),
                _ => 0,
            })
            .sum()
    }

    /// Turns every entity into a delta against the entity at the same
    /// index of `base`. Entities whose ids differ are left whole.
    pub fn strip(&mut self, base: &Scene) -> Result<(), EntityError> {
        profile_function!();
        paired(&mut self.entities, &base.entities, &self.parallel, |e, b| {
            e.strip(b)
        })
    }

    /// Rebuilds full entities from deltas produced by [`strip`](Self::strip)
    /// against the same `base`.
    pub fn merge(&mut self, base: &Scene) -> Result<(), EntityError> {
        profile_function!();
        paired(&mut self.entities, &base.entities, &self.parallel, |e, b| {
            e.merge(b)
        })
    }

    /// A scene holding `s2`'s entities flagged with their changes since `s1`.
    pub fn diff(s1: &Scene, s2: &Scene) -> Result<Scene, EntityError> {
        profile_function!();
        if s1.entities.len() != s2.entities.len() {
            return Err(EntityError::CountMismatch {
                left: s1.entities.len(),
                right: s2.entities.len(),
            });
        }
        let entities = par_map(&s1.entities, &s1.parallel, |i, e1| {
            let e2 = &s2.entities[i];
            if e1.id != e2.id {
                return Err(EntityError::IdMismatch {
                    index: i,
                    left: e1.id,
                    right: e2.id,
                });
            }
            Entity::diff(e1, e2)
        })
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Scene {
            settings: s1.settings.clone(),
            entities,
            parallel: s1.parallel.clone(),
            ..Scene::default()
        })
    }

    /// Interpolates `s1` toward `s2`.
    ///
    /// Entities that cannot be blended (different ids, kinds or shapes, or
    /// constant) are taken from `s1` as is.
    pub fn lerp(s1: &Scene, s2: &Scene, t: f32) -> Result<Scene, EntityError> {
        profile_function!();
        if s1.entities.len() != s2.entities.len() {
            return Err(EntityError::CountMismatch {
                left: s1.entities.len(),
                right: s2.entities.len(),
            });
        }
        let entities = par_map(&s1.entities, &s1.parallel, |i, e1| {
            let e2 = &s2.entities[i];
            let mut out = e1.clone();
            if e1.id == e2.id && !out.lerp(e1, e2, t) {
                log::trace!("entity `{}` not interpolated", e1.path);
            }
            out
        });
        Ok(Scene {
            settings: s1.settings.clone(),
            entities,
            parallel: s1.parallel.clone(),
            ..Scene::default()
        })
    }

    /// Prepares a received scene for use: refines meshes, converts every
    /// entity and animation to canonical space, and updates bounds.
    ///
    /// Afterwards the scene settings describe canonical space.
    pub fn import(&mut self, import: &ImportSettings) -> Result<(), ImportError> {
        profile_function!();
        let converters = build_converters(&self.settings, import, false);
        update_entities(&mut self.entities, import, &converters, &self.parallel)?;
        update_entities(&mut self.instance_meshes, import, &converters, &self.parallel)?;

        for asset in &mut self.assets {
            sanitize_object_name(asset.name_mut());
            if let Asset::Animation(clip) = asset {
                par_for_each_mut(&mut clip.animations, &self.parallel, |_, anim| {
                    sanitize_hierarchy_path(&mut anim.path);
                    anim.validate();
                    convert_animation(anim, &converters);
                });
            }
        }

        self.settings.handedness = Handedness::Left;
        self.settings.scale_factor = 1.0;
        Ok(())
    }

    /// Resolves parents by path and computes local and world matrices.
    pub fn build_hierarchy(&mut self) {
        profile_function!();
        // Parents sort before their children.
        let mut order: Vec<usize> = (0..self.entities.len()).collect();
        order.sort_by(|&a, &b| self.entities[a].path.cmp(&self.entities[b].path));

        let parents: Vec<Option<usize>> = self
            .entities
            .iter()
            .map(|e| {
                let parent = e.parent_path()?;
                order
                    .binary_search_by(|&i| self.entities[i].path.as_str().cmp(parent))
                    .ok()
                    .map(|pos| order[pos])
            })
            .collect();

        for &i in &order {
            let local = self.entities[i].transform.local_matrix();
            let world = match parents[i] {
                Some(p) => self.entities[p].world_matrix * local,
                None => local,
            };
            let e = &mut self.entities[i];
            e.parent = parents[i];
            e.local_matrix = local;
            e.world_matrix = world;
        }
    }

    fn data_flags(&self) -> SceneDataFlags {
        let mut flags = SceneDataFlags::HAS_SETTINGS;
        flags.set(SceneDataFlags::HAS_ASSETS, !self.assets.is_empty());
        flags.set(SceneDataFlags::HAS_ENTITIES, !self.entities.is_empty());
        flags.set(SceneDataFlags::HAS_CONSTRAINTS, !self.constraints.is_empty());
        flags.set(
            SceneDataFlags::HAS_INSTANCE_INFOS,
            !self.instance_infos.is_empty(),
        );
        flags.set(
            SceneDataFlags::HAS_PROPERTY_INFOS,
            !self.property_infos.is_empty(),
        );
        flags.set(
            SceneDataFlags::HAS_INSTANCE_MESHES,
            !self.instance_meshes.is_empty(),
        );
        flags
    }

    fn encode_body(&self, w: &mut Writer) {
        let flags = self.data_flags();
        w.write_u32(flags.bits());
        self.settings.encode(w);
        if flags.contains(SceneDataFlags::HAS_ASSETS) {
            w.write_seq(&self.assets);
        }
        if flags.contains(SceneDataFlags::HAS_ENTITIES) {
            w.write_seq(&self.entities);
        }
        if flags.contains(SceneDataFlags::HAS_CONSTRAINTS) {
            w.write_seq(&self.constraints);
        }
        if flags.contains(SceneDataFlags::HAS_INSTANCE_INFOS) {
            w.write_seq(&self.instance_infos);
        }
        if flags.contains(SceneDataFlags::HAS_PROPERTY_INFOS) {
            w.write_seq(&self.property_infos);
        }
        if flags.contains(SceneDataFlags::HAS_INSTANCE_MESHES) {
            w.write_seq(&self.instance_meshes);
        }
    }

    fn decode_body(r: &mut Reader) -> Result<Self, DecodeError> {
        let flags = SceneDataFlags::from_bits_truncate(r.read_u32()?);
        let mut scene = Scene::default();
        if flags.contains(SceneDataFlags::HAS_SETTINGS) {
            scene.settings = SceneSettings::decode(r)?;
        }
        if flags.contains(SceneDataFlags::HAS_ASSETS) {
            scene.assets = r.read_seq()?;
        }
        if flags.contains(SceneDataFlags::HAS_ENTITIES) {
            scene.entities = r.read_seq()?;
        }
        if flags.contains(SceneDataFlags::HAS_CONSTRAINTS) {
            scene.constraints = r.read_seq()?;
        }
        if flags.contains(SceneDataFlags::HAS_INSTANCE_INFOS) {
            scene.instance_infos = r.read_seq()?;
        }
        if flags.contains(SceneDataFlags::HAS_PROPERTY_INFOS) {
            scene.property_infos = r.read_seq()?;
        }
        if flags.contains(SceneDataFlags::HAS_INSTANCE_MESHES) {
            scene.instance_meshes = r.read_seq()?;
        }
        Ok(scene)
    }

    /// Content hash of the encoded scene, as written in its header.
    pub fn hash(&self) -> u64 {
        let mut w = Writer::new();
        self.encode_body(&mut w);
        content_hash(w.as_bytes())
    }

    /// Uncompressed wire form: hash followed by the body.
    pub fn encode_raw(&self) -> Vec<u8> {
        let mut body = Writer::new();
        self.encode_body(&mut body);
        let mut w = Writer::with_capacity(body.len() + 8);
        w.write_u64(content_hash(body.as_bytes()));
        let mut bytes = w.into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        bytes
    }

    /// Parses an uncompressed payload, verifying its hash. Decoded arrays
    /// alias `bytes` until first modified.
    pub fn decode_raw(bytes: Arc<[u8]>) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);
        let expected = r.read_u64()?;
        let actual = content_hash(r.rest());
        if expected != actual {
            log::warn!("dropping scene payload: hash {expected:#x} != {actual:#x}");
            return Err(DecodeError::HashMismatch { expected, actual });
        }
        Self::decode_body(&mut r)
    }

    /// Encodes and compresses with `codec`.
    pub fn to_bytes(&self, codec: &dyn Codec) -> std::io::Result<Vec<u8>> {
        profile_scope!("Scene::to_bytes");
        let raw = self.encode_raw();
        let mut out = Vec::with_capacity(raw.len() / 2);
        codec.encode(&mut out, &raw)?;
        log::debug!(
            "encoded scene: {} entities, {} bytes raw, {} bytes on the wire",
            self.entities.len(),
            raw.len(),
            out.len()
        );
        Ok(out)
    }

    /// Decompresses with `codec` and decodes.
    pub fn from_bytes(bytes: &[u8], codec: &dyn Codec) -> Result<Self, DecodeError> {
        profile_scope!("Scene::from_bytes");
        let mut raw = Vec::new();
        codec.decode(&mut raw, bytes)?;
        Self::decode_raw(Arc::from(raw))
    }
}

fn update_entities(
    entities: &mut [Entity],
    import: &ImportSettings,
    converters: &[Box<dyn EntityConverter>],
    config: &ParConfig,
) -> Result<(), ImportError> {
    let first_error = Mutex::new(None);
    par_for_each_mut(entities, config, |_, e| {
        sanitize_hierarchy_path(&mut e.path);
        sanitize_hierarchy_path(&mut e.transform.reference);
        if let EntityKind::Mesh(mesh) = &mut e.kind {
            for bone in &mut mesh.bones {
                sanitize_hierarchy_path(&mut bone.path);
            }
            let settings = &mut mesh.refine_settings;
            settings.flags.insert(RefineFlags::SPLIT);
            settings.split_unit = import.mesh_split_unit;
            settings.max_bone_influence = import.mesh_max_bone_influence;
            if let Err(source) = mesh.refine() {
                log::warn!("mesh `{}` kept unrefined: {source}", e.path);
                first_error.lock().get_or_insert(ImportError {
                    path: e.path.clone(),
                    source,
                });
                return;
            }
        }
        convert_entity(e, converters);
        e.update_bounds();
    });
    match first_error.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Deflate, Identity};
    use crate::entity::{CacheFlags, CameraData, PointsData};
    use meshlink_core::math::Vec3;

    fn points(path: &str, id: i32, xs: &[f32]) -> Entity {
        let data = PointsData {
            points: xs.iter().map(|&x| Vec3::new(x, 0.0, 0.0)).collect(),
            ..Default::default()
        };
        Entity::new(path, EntityKind::Points(data)).with_id(id)
    }

    fn sample_scene() -> Scene {
        Scene::new().with_entities(vec![
            Entity::new("/root", EntityKind::Transform)
                .with_id(1)
                .with_position(Vec3::new(0.0, 1.0, 0.0)),
            Entity::new("/root/cam", EntityKind::Camera(CameraData::default())).with_id(2),
            points("/root/dust", 3, &[0.0, 1.0, 2.0]),
        ])
    }

    #[test]
    fn object_names_lose_separators() {
        let mut name = String::from("a/b\\c");
        sanitize_object_name(&mut name);
        assert_eq!(name, "a_b_c");
    }

    #[test]
    fn hierarchy_paths_keep_separators() {
        let mut path = String::from("/rig\\left/hand");
        sanitize_hierarchy_path(&mut path);
        assert_eq!(path, "/rig_left/hand");
    }

    #[test]
    fn import_sanitizes_paths() {
        let mut bone_mesh = crate::entity::MeshData {
            points: vec![Vec3::zeros(), Vec3::x(), Vec3::y()].into(),
            indices: vec![0, 1, 2].into(),
            ..Default::default()
        };
        bone_mesh.bones.push(crate::entity::BoneData {
            path: "/rig\\hip".into(),
            ..Default::default()
        });
        let mut scene = Scene::new().with_entities(vec![
            Entity::new("/root\\a", EntityKind::Transform).with_id(1),
            Entity::new("/root/skin", EntityKind::Mesh(Box::new(bone_mesh))).with_id(2),
        ]);
        scene.entities[0].transform.reference = "/proto\\b".into();

        let mut clip = crate::animation::AnimationClip::new(1, "clips/a");
        clip.animations.push(crate::animation::Animation::new(
            EntityType::Transform,
            "/root\\a",
        ));
        scene.assets.push(Asset::Animation(clip));

        scene.import(&ImportSettings::default()).unwrap();

        assert_eq!(scene.entities[0].path, "/root_a");
        assert_eq!(scene.entities[0].transform.reference, "/proto_b");
        let skin = scene.entities[1].as_mesh().unwrap();
        assert_eq!(skin.bones[0].path, "/rig_hip");
        let Asset::Animation(clip) = &scene.assets[0] else {
            unreachable!()
        };
        assert_eq!(clip.name, "clips_a");
        assert_eq!(clip.animations[0].path, "/root_a");
    }

    #[test]
    fn empty_scene_has_only_settings() {
        let scene = Scene::new();
        assert_eq!(scene.data_flags(), SceneDataFlags::HAS_SETTINGS);
        let back = Scene::decode_raw(Arc::from(scene.encode_raw())).unwrap();
        assert!(back.is_empty());
        assert_eq!(back.settings, SceneSettings::default());
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut bytes = sample_scene().encode_raw();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = Scene::decode_raw(Arc::from(bytes)).unwrap_err();
        assert!(matches!(err, DecodeError::HashMismatch { .. }));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let err = Scene::decode_raw(Arc::from(vec![1u8, 2, 3])).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof));
    }

    #[test]
    fn compressed_round_trip() {
        let scene = sample_scene();
        let codecs: [&dyn Codec; 2] = [&Identity, &Deflate::default()];
        for codec in codecs {
            let bytes = scene.to_bytes(codec).unwrap();
            let back = Scene::from_bytes(&bytes, codec).unwrap();
            assert_eq!(back.entities, scene.entities);
            assert_eq!(back.hash(), scene.hash());
        }
    }

    #[test]
    fn strip_requires_equal_counts() {
        let mut a = sample_scene();
        let b = Scene::new();
        assert_eq!(
            a.strip(&b),
            Err(EntityError::CountMismatch { left: 3, right: 0 })
        );
    }

    #[test]
    fn diff_reports_id_mismatch() {
        let a = sample_scene();
        let mut b = sample_scene();
        b.entities[2].id = 9;
        assert_eq!(
            Scene::diff(&a, &b).unwrap_err(),
            EntityError::IdMismatch {
                index: 2,
                left: 3,
                right: 9
            }
        );
    }

    #[test]
    fn lerp_falls_back_on_shape_mismatch() {
        let a = Scene::new().with_entities(vec![points("/p", 1, &[0.0, 2.0])]);
        let b = Scene::new().with_entities(vec![points("/p", 1, &[4.0, 6.0])]);
        let c = Scene::new().with_entities(vec![points("/p", 1, &[4.0])]);

        let mid = Scene::lerp(&a, &b, 0.5).unwrap();
        assert_eq!(
            mid.entities[0].as_points().unwrap().points[1],
            Vec3::new(4.0, 0.0, 0.0)
        );

        let fallback = Scene::lerp(&a, &c, 0.5).unwrap();
        assert_eq!(fallback.entities[0], a.entities[0]);
    }

    #[test]
    fn constant_entities_are_not_merged() {
        let base = sample_scene();
        let mut delta = sample_scene();
        delta.entities[0].path.clear();
        delta.entities[0].cache_flags = CacheFlags::CONSTANT;
        delta.merge(&base).unwrap();
        assert!(delta.entities[0].path.is_empty());
        assert_eq!(delta.entities[1].path, "/root/cam");
    }

    #[test]
    fn hierarchy_composes_world_matrices() {
        let mut scene = sample_scene();
        scene.entities[1].transform.position = Vec3::new(2.0, 0.0, 0.0);
        scene.build_hierarchy();

        assert_eq!(scene.entities[0].parent, None);
        assert_eq!(scene.entities[1].parent, Some(0));
        let world = scene.entities[1].world_matrix;
        assert_eq!(
            Vec3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]),
            Vec3::new(2.0, 1.0, 0.0)
        );
    }

    #[test]
    fn lookups() {
        let scene = sample_scene();
        assert_eq!(scene.find_entity("/root/cam").map(|e| e.id), Some(2));
        assert_eq!(scene.entity_by_id(3).map(|e| e.path.as_str()), Some("/root/dust"));
        assert!(scene.find_entity("/missing").is_none());
        assert_eq!(scene.entities_of_type(EntityType::Points).count(), 1);
        assert_eq!(scene.vertex_count(), 3);
    }

    #[test]
    fn concat_appends_and_takes_settings() {
        let mut a = sample_scene();
        let b = Scene::new()
            .with_settings(SceneSettings {
                scale_factor: 2.0,
                ..Default::default()
            })
            .with_entities(vec![points("/extra", 4, &[1.0])]);
        a.concat(b);
        assert_eq!(a.entities.len(), 4);
        assert_eq!(a.settings.scale_factor, 2.0);

        a.clear();
        assert!(a.is_empty());
        assert_eq!(a.parallel.min_batch_size, 10);
    }
}
