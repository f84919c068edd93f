//! Coordinate-system converters.
//!
//! A converter visits every entity payload and animation curve and rewrites
//! spatial quantities in place. [`build_converters`] assembles the chain
//! that takes a sender's [`SceneSettings`] to the canonical left-handed,
//! Y-up, unit-scale space (or back, with `invert`).
//!
//! Every converter has an exact inverse, so the reverse chain is the forward
//! chain inverted step by step in reverse order.

use bytemuck::Pod;
use meshlink_core::math::{
    quat_from_rotation_x, AxisFlip, Mat4, Quat, Vec3, Vec4, DEG_TO_RAD,
};
use meshlink_core::SharedVec;

use crate::animation::{Animation, AnimationCurve, ChannelFlags, Keyframes, TRANSFORM_ROTATION};
use crate::entity::{
    CameraData, CurveData, Entity, EntityKind, EntityType, LightData, MeshData, PointsData,
    TransformData,
};
use crate::settings::{ImportSettings, SceneSettings, ZUpCorrection};

/// What a converter needs to know about the owner of a transform or curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub entity_type: EntityType,
    pub is_root: bool,
}

impl Target {
    pub fn of_entity(e: &Entity) -> Self {
        Self {
            entity_type: e.entity_type(),
            is_root: e.is_root(),
        }
    }

    pub fn of_animation(a: &Animation) -> Self {
        Self {
            entity_type: a.entity_type,
            is_root: a.is_root(),
        }
    }

    fn is_camera_or_light(self) -> bool {
        matches!(self.entity_type, EntityType::Camera | EntityType::Light)
    }
}

/// Visitor over entity payloads. Kinds a converter does not touch keep the
/// default no-op.
pub trait EntityConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// The converter that undoes this one.
    fn inverse(&self) -> Box<dyn EntityConverter>;

    fn convert_transform(&self, t: &mut TransformData, target: Target);

    fn convert_camera(&self, _c: &mut CameraData) {}

    fn convert_light(&self, _l: &mut LightData) {}

    fn convert_mesh(&self, _m: &mut MeshData) {}

    fn convert_points(&self, _p: &mut PointsData) {}

    fn convert_curve(&self, _c: &mut CurveData) {}

    fn convert_animation_curve(&self, _c: &mut AnimationCurve, _target: Target) {}

    fn convert(&self, e: &mut Entity) {
        let target = Target::of_entity(e);
        self.convert_transform(&mut e.transform, target);
        match &mut e.kind {
            EntityKind::Transform => {}
            EntityKind::Camera(c) => self.convert_camera(c),
            EntityKind::Light(l) => self.convert_light(l),
            EntityKind::Mesh(m) => self.convert_mesh(m),
            EntityKind::Points(p) => self.convert_points(p),
            EntityKind::Curve(c) => self.convert_curve(c),
        }
    }

    fn convert_animation(&self, anim: &mut Animation) {
        let target = Target::of_animation(anim);
        for curve in &mut anim.curves {
            self.convert_animation_curve(curve, target);
        }
    }
}

/// Runs `converters` over `e` in order.
pub fn convert_entity(e: &mut Entity, converters: &[Box<dyn EntityConverter>]) {
    for c in converters {
        c.convert(e);
    }
}

pub fn convert_animation(anim: &mut Animation, converters: &[Box<dyn EntityConverter>]) {
    for c in converters {
        c.convert_animation(anim);
    }
}

/// Converter chain from `settings` space to canonical space, or from
/// canonical space back to `settings` space when `invert` is set.
///
/// Forward order is scale, handedness, up axis.
pub fn build_converters(
    settings: &SceneSettings,
    import: &ImportSettings,
    invert: bool,
) -> Vec<Box<dyn EntityConverter>> {
    let mut chain: Vec<Box<dyn EntityConverter>> = Vec::new();
    if settings.scale_factor != 1.0 && settings.scale_factor != 0.0 {
        chain.push(Box::new(ScaleConverter::new(1.0 / settings.scale_factor)));
    }
    if settings.handedness.flips_x() {
        chain.push(Box::new(FlipX));
    }
    if settings.handedness.is_z_up() {
        match import.zup_correction {
            ZUpCorrection::FlipYZ => chain.push(Box::new(FlipYZ::new())),
            ZUpCorrection::RotateX => chain.push(Box::new(RotateX::new())),
        }
    }
    if invert {
        chain = chain.iter().rev().map(|c| c.inverse()).collect();
    }
    log::debug!(
        "converter chain{}: [{}]",
        if invert { " (inverse)" } else { "" },
        chain.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
    );
    chain
}

fn map_in_place<T: Pod>(values: &mut SharedVec<T>, f: impl Fn(T) -> T) {
    if values.is_empty() {
        return;
    }
    for v in values.make_mut().iter_mut() {
        *v = f(*v);
    }
}

fn map_keys<T: Copy>(keys: &mut [crate::animation::Key<T>], f: impl Fn(T) -> T) {
    for k in keys {
        k.value = f(k.value);
    }
}

/// Uniform scale of positions and lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConverter {
    scale: f32,
}

impl ScaleConverter {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    fn translation(&self, m: &mut Mat4) {
        for r in 0..3 {
            m[(r, 3)] *= self.scale;
        }
    }
}

impl EntityConverter for ScaleConverter {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn inverse(&self) -> Box<dyn EntityConverter> {
        Box::new(Self::new(1.0 / self.scale))
    }

    fn convert_transform(&self, t: &mut TransformData, _target: Target) {
        t.position *= self.scale;
    }

    fn convert_camera(&self, c: &mut CameraData) {
        c.near_plane *= self.scale;
        c.far_plane *= self.scale;
        self.translation(&mut c.view_matrix);
    }

    fn convert_light(&self, l: &mut LightData) {
        l.range *= self.scale;
    }

    fn convert_mesh(&self, m: &mut MeshData) {
        let s = self.scale;
        map_in_place(&mut m.points, |v| v * s);
        map_in_place(&mut m.velocities, |v| v * s);
        for bone in &mut m.bones {
            self.translation(&mut bone.bindpose);
        }
        for frame in m.blendshapes.iter_mut().flat_map(|b| &mut b.frames) {
            map_in_place(&mut frame.points, |v| v * s);
        }
    }

    fn convert_points(&self, p: &mut PointsData) {
        let s = self.scale;
        map_in_place(&mut p.points, |v| v * s);
        map_in_place(&mut p.velocities, |v| v * s);
    }

    fn convert_curve(&self, c: &mut CurveData) {
        let s = self.scale;
        for spline in &mut c.splines {
            spline.map_points(|v| v * s);
        }
    }

    fn convert_animation_curve(&self, c: &mut AnimationCurve, _target: Target) {
        if !c.flags.contains(ChannelFlags::AFFECT_SCALE) {
            return;
        }
        let s = self.scale;
        match &mut c.keys {
            Keyframes::Float(k) => map_keys(k, |v| v * s),
            Keyframes::Float2(k) => map_keys(k, |v| v * s),
            Keyframes::Float3(k) => map_keys(k, |v| v * s),
            Keyframes::Float4(k) => map_keys(k, |v| v * s),
            Keyframes::Int(_) | Keyframes::Quaternion(_) => {}
        }
    }
}

/// Linear remapping of axes applied to whole payloads.
trait AxisMap {
    fn vec3(&self, v: Vec3) -> Vec3;
    fn vec4(&self, v: Vec4) -> Vec4;
    fn quat(&self, q: Quat) -> Quat;
    fn mat4(&self, m: &Mat4) -> Mat4;
    /// Per-axis magnitudes such as scale: permuted, never negated.
    fn magnitude(&self, v: Vec3) -> Vec3;

    fn map_mesh(&self, m: &mut MeshData) {
        map_in_place(&mut m.points, |v| self.vec3(v));
        map_in_place(&mut m.normals, |v| self.vec3(v));
        map_in_place(&mut m.tangents, |v| self.vec4(v));
        map_in_place(&mut m.velocities, |v| self.vec3(v));
        for bone in &mut m.bones {
            bone.bindpose = self.mat4(&bone.bindpose);
        }
        for frame in m.blendshapes.iter_mut().flat_map(|b| &mut b.frames) {
            map_in_place(&mut frame.points, |v| self.vec3(v));
            map_in_place(&mut frame.normals, |v| self.vec3(v));
            map_in_place(&mut frame.tangents, |v| self.vec3(v));
        }
    }

    fn map_points(&self, p: &mut PointsData) {
        map_in_place(&mut p.points, |v| self.vec3(v));
        map_in_place(&mut p.rotations, |q| self.quat(q));
        map_in_place(&mut p.scales, |v| self.magnitude(v));
        map_in_place(&mut p.velocities, |v| self.vec3(v));
    }

    fn map_curve(&self, c: &mut CurveData) {
        for spline in &mut c.splines {
            spline.map_points(|v| self.vec3(v));
        }
    }

    /// Vector and rotation channels flagged as spatial.
    fn map_channel(&self, c: &mut AnimationCurve) {
        if !c.flags.contains(ChannelFlags::AFFECT_HANDEDNESS) {
            return;
        }
        let magnitude = c.flags.contains(ChannelFlags::IGNORE_NEGATE);
        match &mut c.keys {
            Keyframes::Float3(k) if magnitude => map_keys(k, |v| self.magnitude(v)),
            Keyframes::Float3(k) => map_keys(k, |v| self.vec3(v)),
            Keyframes::Float4(k) if magnitude => {
                map_keys(k, |v| {
                    let m = self.magnitude(v.xyz());
                    Vec4::new(m.x, m.y, m.z, v.w)
                })
            }
            Keyframes::Float4(k) => map_keys(k, |v| self.vec4(v)),
            Keyframes::Quaternion(_) if magnitude => {}
            Keyframes::Quaternion(k) => map_keys(k, |q| self.quat(q)),
            Keyframes::Int(_) | Keyframes::Float(_) | Keyframes::Float2(_) => {}
        }
    }
}

/// Mirror across the YZ plane: right-handed to left-handed.
///
/// Its own inverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipX;

impl AxisMap for FlipX {
    fn vec3(&self, v: Vec3) -> Vec3 {
        v.flip_x()
    }
    fn vec4(&self, v: Vec4) -> Vec4 {
        v.flip_x()
    }
    fn quat(&self, q: Quat) -> Quat {
        q.flip_x()
    }
    fn mat4(&self, m: &Mat4) -> Mat4 {
        m.flip_x()
    }
    fn magnitude(&self, v: Vec3) -> Vec3 {
        v
    }
}

impl EntityConverter for FlipX {
    fn name(&self) -> &'static str {
        "flip_x"
    }

    fn inverse(&self) -> Box<dyn EntityConverter> {
        Box::new(*self)
    }

    fn convert_transform(&self, t: &mut TransformData, _target: Target) {
        t.position = t.position.flip_x();
        t.rotation = t.rotation.flip_x();
    }

    fn convert_camera(&self, c: &mut CameraData) {
        c.view_matrix = c.view_matrix.flip_x();
        c.proj_matrix = c.proj_matrix.flip_x();
    }

    fn convert_mesh(&self, m: &mut MeshData) {
        self.map_mesh(m);
    }

    fn convert_points(&self, p: &mut PointsData) {
        self.map_points(p);
    }

    fn convert_curve(&self, c: &mut CurveData) {
        self.map_curve(c);
    }

    fn convert_animation_curve(&self, c: &mut AnimationCurve, _target: Target) {
        self.map_channel(c);
    }
}

/// Z-up to Y-up axis change `(x, y, z) -> (x, z, -y)` and its inverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ZUpAxes {
    inverse: bool,
}

impl ZUpAxes {
    fn apply<T: AxisFlip>(&self, v: &T) -> T {
        if self.inverse {
            v.flip_z().swap_yz()
        } else {
            v.swap_yz().flip_z()
        }
    }

    /// Folds in the fixed -90 degree X rotation that keeps cameras and
    /// lights looking down their own axis after the swap.
    fn corrected_rotation(&self, q: Quat) -> Quat {
        let cr = quat_from_rotation_x(-90.0 * DEG_TO_RAD);
        if self.inverse {
            self.apply(&(q * cr.conjugate()))
        } else {
            self.apply(&q) * cr
        }
    }
}

impl AxisMap for ZUpAxes {
    fn vec3(&self, v: Vec3) -> Vec3 {
        self.apply(&v)
    }
    fn vec4(&self, v: Vec4) -> Vec4 {
        self.apply(&v)
    }
    fn quat(&self, q: Quat) -> Quat {
        self.apply(&q)
    }
    fn mat4(&self, m: &Mat4) -> Mat4 {
        self.apply(m)
    }
    fn magnitude(&self, v: Vec3) -> Vec3 {
        v.swap_yz()
    }
}

/// Z-up correction applied to every spatial quantity of every entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipYZ {
    axes: ZUpAxes,
}

impl FlipYZ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Y-up back to Z-up.
    pub fn reverse() -> Self {
        Self {
            axes: ZUpAxes { inverse: true },
        }
    }
}

impl EntityConverter for FlipYZ {
    fn name(&self) -> &'static str {
        if self.axes.inverse {
            "flip_yz_inverse"
        } else {
            "flip_yz"
        }
    }

    fn inverse(&self) -> Box<dyn EntityConverter> {
        Box::new(Self {
            axes: ZUpAxes {
                inverse: !self.axes.inverse,
            },
        })
    }

    fn convert_transform(&self, t: &mut TransformData, target: Target) {
        t.position = self.axes.vec3(t.position);
        t.rotation = if target.is_camera_or_light() {
            self.axes.corrected_rotation(t.rotation)
        } else {
            self.axes.quat(t.rotation)
        };
        t.scale = self.axes.magnitude(t.scale);
    }

    fn convert_camera(&self, c: &mut CameraData) {
        c.view_matrix = self.axes.mat4(&c.view_matrix);
        c.proj_matrix = self.axes.mat4(&c.proj_matrix);
    }

    fn convert_mesh(&self, m: &mut MeshData) {
        self.axes.map_mesh(m);
    }

    fn convert_points(&self, p: &mut PointsData) {
        self.axes.map_points(p);
    }

    fn convert_curve(&self, c: &mut CurveData) {
        self.axes.map_curve(c);
    }

    fn convert_animation_curve(&self, c: &mut AnimationCurve, target: Target) {
        let corrected = c.name == TRANSFORM_ROTATION
            && target.is_camera_or_light()
            && c.flags.contains(ChannelFlags::AFFECT_HANDEDNESS);
        if let (true, Keyframes::Quaternion(k)) = (corrected, &mut c.keys) {
            map_keys(k, |q| self.axes.corrected_rotation(q));
            return;
        }
        self.axes.map_channel(c);
    }
}

/// Z-up correction applied to root transforms and root animations only.
///
/// Children keep their local values; the corrected root carries them along.
/// This gives different results from [`FlipYZ`] under non-uniform scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotateX {
    axes: ZUpAxes,
}

impl RotateX {
    pub fn new() -> Self {
        Self::default()
    }

    /// Y-up back to Z-up.
    pub fn reverse() -> Self {
        Self {
            axes: ZUpAxes { inverse: true },
        }
    }
}

impl EntityConverter for RotateX {
    fn name(&self) -> &'static str {
        if self.axes.inverse {
            "rotate_x_inverse"
        } else {
            "rotate_x"
        }
    }

    fn inverse(&self) -> Box<dyn EntityConverter> {
        Box::new(Self {
            axes: ZUpAxes {
                inverse: !self.axes.inverse,
            },
        })
    }

    fn convert_transform(&self, t: &mut TransformData, target: Target) {
        if !target.is_root {
            return;
        }
        t.position = self.axes.vec3(t.position);
        t.rotation = self.axes.corrected_rotation(t.rotation);
        t.scale = self.axes.magnitude(t.scale);
    }

    fn convert_animation_curve(&self, c: &mut AnimationCurve, target: Target) {
        if !target.is_root {
            return;
        }
        let corrected = c.flags.contains(ChannelFlags::AFFECT_HANDEDNESS);
        if let (true, Keyframes::Quaternion(k)) = (corrected, &mut c.keys) {
            map_keys(k, |q| self.axes.corrected_rotation(q));
            return;
        }
        self.axes.map_channel(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Key, TRANSFORM_SCALE, TRANSFORM_TRANSLATION};
    use crate::entity::{BoneData, CameraData, MeshData};
    use crate::settings::Handedness;
    use meshlink_core::math::{quat_from_rotation_y, NearEqual};
    use rstest::rstest;

    fn mesh_entity(path: &str) -> Entity {
        let mesh = MeshData {
            points: vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0)].into(),
            normals: vec![Vec3::new(0.0, 0.0, 1.0); 2].into(),
            tangents: vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 2].into(),
            bones: vec![BoneData {
                path: "/rig/hip".into(),
                bindpose: Mat4::new_translation(&Vec3::new(0.0, 1.0, 2.0)),
                ..Default::default()
            }],
            ..Default::default()
        };
        Entity::new(path, EntityKind::Mesh(Box::new(mesh)))
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(quat_from_rotation_y(0.3))
            .with_scale(Vec3::new(1.0, 2.0, 4.0))
    }

    fn settings(handedness: Handedness, scale_factor: f32) -> SceneSettings {
        SceneSettings {
            handedness,
            scale_factor,
            ..Default::default()
        }
    }

    fn names(chain: &[Box<dyn EntityConverter>]) -> Vec<&'static str> {
        chain.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn chain_order_and_inverse() {
        let s = settings(Handedness::RightZUp, 100.0);
        let import = ImportSettings::default();
        assert_eq!(
            names(&build_converters(&s, &import, false)),
            ["scale", "flip_x", "flip_yz"]
        );
        assert_eq!(
            names(&build_converters(&s, &import, true)),
            ["flip_yz_inverse", "flip_x", "scale"]
        );

        let rotate = ImportSettings {
            zup_correction: ZUpCorrection::RotateX,
            ..Default::default()
        };
        assert_eq!(
            names(&build_converters(&settings(Handedness::LeftZUp, 1.0), &rotate, false)),
            ["rotate_x"]
        );
        assert!(build_converters(&SceneSettings::default(), &import, false).is_empty());
    }

    #[test]
    fn scale_divides_by_scene_scale_factor() {
        let chain = build_converters(
            &settings(Handedness::Left, 100.0),
            &ImportSettings::default(),
            false,
        );
        let mut e = mesh_entity("/m");
        convert_entity(&mut e, &chain);
        assert!(e.transform.position.near_equal(&Vec3::new(0.01, 0.02, 0.03)));
        let mesh = e.as_mesh().unwrap();
        assert!(mesh.points[0].near_equal(&Vec3::new(0.01, 0.02, 0.03)));
        assert!(mesh.bones[0].bindpose[(2, 3)].near_equal(&0.02));
        // Directions are not lengths.
        assert_eq!(mesh.normals[0], Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn flip_yz_maps_z_up_to_y_up() {
        let mut e = mesh_entity("/m");
        FlipYZ::new().convert(&mut e);
        assert_eq!(e.transform.position, Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(e.transform.scale, Vec3::new(1.0, 4.0, 2.0));
        let mesh = e.as_mesh().unwrap();
        assert_eq!(mesh.normals[0], Vec3::new(0.0, 1.0, 0.0));
    }

    #[rstest]
    #[case(Handedness::Right, ZUpCorrection::FlipYZ)]
    #[case(Handedness::RightZUp, ZUpCorrection::FlipYZ)]
    #[case(Handedness::LeftZUp, ZUpCorrection::RotateX)]
    #[case(Handedness::RightZUp, ZUpCorrection::RotateX)]
    fn inverse_chain_restores_entities(
        #[case] handedness: Handedness,
        #[case] zup_correction: ZUpCorrection,
    ) {
        let s = settings(handedness, 2.5);
        let import = ImportSettings {
            zup_correction,
            ..Default::default()
        };
        let original = [
            mesh_entity("/m"),
            Entity::new("/cam", EntityKind::Camera(CameraData::default()))
                .with_position(Vec3::new(0.0, -5.0, 1.0))
                .with_rotation(quat_from_rotation_y(1.0)),
        ];
        for e in &original {
            let mut converted = e.clone();
            convert_entity(&mut converted, &build_converters(&s, &import, false));
            convert_entity(&mut converted, &build_converters(&s, &import, true));

            assert!(converted.transform.position.near_equal(&e.transform.position));
            assert!(converted.transform.rotation.near_equal(&e.transform.rotation));
            assert!(converted.transform.scale.near_equal(&e.transform.scale));
            if let (Some(a), Some(b)) = (converted.as_mesh(), e.as_mesh()) {
                assert!(a.points.near_equal(&b.points));
                assert!(a.tangents.near_equal(&b.tangents));
                assert!(a.bones[0].bindpose.near_equal(&b.bones[0].bindpose));
            }
        }
    }

    #[test]
    fn rotate_x_only_touches_roots() {
        let mut root = mesh_entity("/root");
        let mut child = mesh_entity("/root/child");
        let before = child.clone();
        RotateX::new().convert(&mut root);
        RotateX::new().convert(&mut child);

        assert_eq!(root.transform.position, Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(root.as_mesh().unwrap().points, before.as_mesh().unwrap().points);
        assert_eq!(child, before);
    }

    #[test]
    fn flip_x_mirrors_rotation() {
        let mut e = mesh_entity("/m");
        let q = e.transform.rotation;
        FlipX.convert(&mut e);
        assert_eq!(e.transform.position, Vec3::new(-1.0, 2.0, 3.0));
        assert_eq!(e.transform.rotation.i, q.i);
        assert_eq!(e.transform.rotation.j, -q.j);
        assert_eq!(e.transform.rotation.k, -q.k);
        // Scale is a magnitude.
        assert_eq!(e.transform.scale, Vec3::new(1.0, 2.0, 4.0));
    }

    #[test]
    fn animation_channels_follow_their_flags() {
        let mut anim = Animation::new(EntityType::Transform, "/a");
        anim.add_curve(AnimationCurve::new(
            TRANSFORM_TRANSLATION,
            Keyframes::Float3(vec![Key::new(0.0, Vec3::new(1.0, 2.0, 3.0))]),
        ));
        anim.add_curve(AnimationCurve::new(
            TRANSFORM_SCALE,
            Keyframes::Float3(vec![Key::new(0.0, Vec3::new(1.0, 2.0, 3.0))]),
        ));
        anim.add_curve(AnimationCurve::new(
            "Custom.offset",
            Keyframes::Float3(vec![Key::new(0.0, Vec3::new(1.0, 2.0, 3.0))]),
        ));

        let chain: Vec<Box<dyn EntityConverter>> =
            vec![Box::new(ScaleConverter::new(2.0)), Box::new(FlipYZ::new())];
        convert_animation(&mut anim, &chain);

        let value = |name: &str| match &anim.find_curve(name).unwrap().keys {
            Keyframes::Float3(k) => k[0].value,
            _ => unreachable!(),
        };
        assert_eq!(value(TRANSFORM_TRANSLATION), Vec3::new(2.0, 6.0, -4.0));
        assert_eq!(value(TRANSFORM_SCALE), Vec3::new(1.0, 3.0, 2.0));
        assert_eq!(value("Custom.offset"), Vec3::new(1.0, 2.0, 3.0));
    }

    #[rstest]
    #[case::plain(ChannelFlags::AFFECT_HANDEDNESS, true)]
    #[case::unsigned(ChannelFlags::AFFECT_HANDEDNESS | ChannelFlags::IGNORE_NEGATE, false)]
    #[case::unflagged(ChannelFlags::empty(), false)]
    fn flip_x_quaternion_channel_respects_flags(
        #[case] flags: ChannelFlags,
        #[case] mirrored: bool,
    ) {
        let q = quat_from_rotation_y(0.3);
        let mut curve = AnimationCurve::new(
            "Custom.orientation",
            Keyframes::Quaternion(vec![Key::new(0.0, q)]),
        );
        curve.flags = flags;
        let target = Target {
            entity_type: EntityType::Transform,
            is_root: true,
        };
        FlipX.convert_animation_curve(&mut curve, target);

        let Keyframes::Quaternion(k) = &curve.keys else {
            unreachable!()
        };
        let expected = if mirrored { q.flip_x() } else { q };
        assert_eq!(k[0].value, expected);
    }
}
