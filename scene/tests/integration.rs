use std::sync::Arc;

use meshlink_core::math::{quat_from_rotation_x, NearEqual, Vec3};
use meshlink_core::parallel::ParConfig;
use meshlink_scene::animation::{TRANSFORM_TRANSLATION, TRANSFORM_VISIBLE};
use meshlink_scene::asset::Texture;
use meshlink_scene::entity::{CameraData, MeshData, PointsData, RefineFlags};
use meshlink_scene::{
    Animation, AnimationClip, AnimationCurve, Asset, Codec, Deflate, Entity, EntityKind,
    EntityType, Handedness, Identity, ImportSettings, Key, Keyframes, Scene, SceneSettings,
    SendSlot,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn quad(offset: f32) -> MeshData {
    let mut mesh = MeshData {
        points: vec![
            Vec3::new(offset, 0.0, 0.0),
            Vec3::new(offset + 2.0, 0.0, 0.0),
            Vec3::new(offset + 2.0, 2.0, 0.0),
            Vec3::new(offset, 2.0, 0.0),
        ]
        .into(),
        counts: vec![4].into(),
        indices: vec![0, 1, 2, 3].into(),
        ..Default::default()
    };
    mesh.refine_settings.flags = RefineFlags::GEN_TRIANGLES | RefineFlags::GEN_NORMALS;
    mesh
}

fn particles(n: usize, y: f32) -> PointsData {
    PointsData {
        points: (0..n).map(|i| Vec3::new(i as f32, y, 0.0)).collect(),
        ..Default::default()
    }
}

/// Enough entities to spread delta work across several batches.
fn frame(t: f32) -> Scene {
    let mut entities = vec![
        Entity::new("/world", EntityKind::Transform).with_id(0),
        Entity::new("/world/cam", EntityKind::Camera(CameraData::default()))
            .with_id(1)
            .with_position(Vec3::new(0.0, 1.0, -10.0)),
        Entity::new("/world/floor", EntityKind::Mesh(Box::new(quad(0.0)))).with_id(2),
    ];
    for i in 0..40 {
        let y = if i % 4 == 0 { t } else { 0.0 };
        entities.push(
            Entity::new(format!("/world/fx{i}"), EntityKind::Points(particles(8, y)))
                .with_id(3 + i),
        );
    }
    Scene::new()
        .with_entities(entities)
        .with_parallel(ParConfig {
            min_batch_size: 10,
            num_threads: Some(4),
        })
}

// ---------------------------------------------------------------------------
// Sender → wire → receiver
// ---------------------------------------------------------------------------

#[test]
fn delta_frame_round_trip() {
    init_logging();
    let previous = frame(0.0);
    let current = frame(1.0);

    let mut delta = current.clone();
    delta.strip(&previous).unwrap();

    let codec = Deflate::default();
    let full_size = current.to_bytes(&codec).unwrap().len();
    let bytes = delta.to_bytes(&codec).unwrap();
    assert!(bytes.len() < full_size);

    let mut received = Scene::from_bytes(&bytes, &codec).unwrap();
    received.merge(&previous).unwrap();

    assert_eq!(received.entities.len(), current.entities.len());
    for (got, want) in received.entities.iter().zip(&current.entities) {
        assert_eq!(got.path, want.path);
        assert_eq!(got.id, want.id);
        assert!(got.transform.position.near_equal(&want.transform.position));
        match (&got.kind, &want.kind) {
            (EntityKind::Points(a), EntityKind::Points(b)) => {
                assert_eq!(a.points.as_slice(), b.points.as_slice());
            }
            (EntityKind::Mesh(a), EntityKind::Mesh(b)) => {
                assert_eq!(a.points.as_slice(), b.points.as_slice());
                assert_eq!(a.indices.as_slice(), b.indices.as_slice());
                assert_eq!(a.counts.as_slice(), b.counts.as_slice());
            }
            (a, b) => assert_eq!(a.entity_type(), b.entity_type()),
        }
    }
}

#[test]
fn unchanged_entities_shrink_to_flags() {
    let previous = frame(0.0);
    let mut delta = frame(0.0);
    delta.strip(&previous).unwrap();

    assert!(delta.entities.iter().all(Entity::is_unchanged));
    assert!(delta.entities.iter().all(|e| e.path.is_empty()));
    assert!(delta.encode_raw().len() < previous.encode_raw().len() / 4);
}

#[test]
fn received_arrays_alias_the_payload() {
    let scene = frame(0.5);
    let raw: Arc<[u8]> = Arc::from(scene.encode_raw());
    let mut received = Scene::decode_raw(raw).unwrap();

    let points = received.entities[5].as_points().unwrap();
    assert!(points.points.is_borrowed());

    if let EntityKind::Points(p) = &mut received.entities[5].kind {
        p.points.make_mut()[0].x = 42.0;
        assert!(!p.points.is_borrowed());
    }
    assert!(received.entities[6].as_points().unwrap().points.is_borrowed());
}

#[test]
fn corrupted_wire_payload_is_dropped() {
    let codec = Identity;
    let mut bytes = frame(0.0).to_bytes(&codec).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] = bytes[mid].wrapping_add(1);
    assert!(Scene::from_bytes(&bytes, &codec).is_err());
}

#[test]
fn diff_flags_only_moved_entities() {
    let a = frame(0.0);
    let b = frame(1.0);
    let d = Scene::diff(&a, &b).unwrap();

    for (i, e) in d.entities.iter().enumerate().skip(3) {
        let moved = (i - 3) % 4 == 0;
        assert_eq!(e.is_unchanged(), !moved, "entity {}", e.path);
    }
    assert!(d.entities[2].is_unchanged());
}

#[test]
fn lerp_between_frames() {
    let a = frame(0.0);
    let b = frame(2.0);
    let mid = Scene::lerp(&a, &b, 0.5).unwrap();

    let p = mid.entities[3].as_points().unwrap();
    assert!(p.points.iter().all(|v| (v.y - 1.0).abs() < 1e-6));
    let still = mid.entities[4].as_points().unwrap();
    assert!(still.points.iter().all(|v| v.y == 0.0));
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[test]
fn import_converts_right_handed_scaled_scene() {
    init_logging();
    let mut scene = frame(0.0).with_settings(SceneSettings {
        name: "blender".into(),
        handedness: Handedness::Right,
        scale_factor: 2.0,
    });
    scene.assets.push(Asset::Texture(Texture {
        name: "dir/albedo".into(),
        ..Texture::default()
    }));
    scene.import(&ImportSettings::default()).unwrap();

    assert_eq!(scene.settings.handedness, Handedness::Left);
    assert_eq!(scene.settings.scale_factor, 1.0);
    assert_eq!(scene.assets[0].name(), "dir_albedo");

    let cam = scene.find_entity("/world/cam").unwrap();
    assert!(cam
        .transform
        .position
        .near_equal(&Vec3::new(0.0, 0.5, -5.0)));

    let floor = scene.find_entity("/world/floor").unwrap().as_mesh().unwrap();
    assert!(floor.counts.is_empty());
    assert_eq!(floor.indices.len(), 6);
    assert_eq!(floor.submeshes.len(), 1);
    assert_eq!(floor.normals.len(), floor.points.len());
    assert!(floor.points.iter().all(|p| p.x <= 0.0));
    assert!(floor
        .bounds
        .center
        .near_equal(&Vec3::new(-0.5, 0.5, 0.0)));
    assert!(floor
        .bounds
        .extents
        .near_equal(&Vec3::new(0.5, 0.5, 0.0)));
}

#[test]
fn import_reports_broken_mesh() {
    init_logging();
    let mut mesh = quad(0.0);
    mesh.indices = vec![0, 1, 2, 9].into();
    let mut scene = Scene::new().with_entities(vec![
        Entity::new("/broken", EntityKind::Mesh(Box::new(mesh))).with_id(1),
    ]);
    let err = scene.import(&ImportSettings::default()).unwrap_err();
    assert_eq!(err.path, "/broken");
}

#[test]
fn import_validates_animations() {
    init_logging();
    let mut anim = Animation::new(EntityType::Transform, "/world/cam");
    anim.add_curve(AnimationCurve::new(
        TRANSFORM_VISIBLE,
        Keyframes::Int(vec![Key::new(0.0, 1), Key::new(1.0, 1)]),
    ));
    anim.add_curve(AnimationCurve::new(
        TRANSFORM_TRANSLATION,
        Keyframes::Float3(vec![
            Key::new(0.0, Vec3::new(2.0, 0.0, 0.0)),
            Key::new(1.0, Vec3::new(4.0, 0.0, 0.0)),
        ]),
    ));

    let mut clip = AnimationClip::new(1, "walk/cycle");
    clip.animations.push(anim);

    let mut scene = Scene::new().with_settings(SceneSettings {
        handedness: Handedness::Right,
        scale_factor: 2.0,
        ..Default::default()
    });
    scene.assets.push(Asset::Animation(clip));
    scene.import(&ImportSettings::default()).unwrap();

    let Asset::Animation(clip) = &scene.assets[0] else {
        panic!("expected an animation asset");
    };
    assert_eq!(clip.name, "walk_cycle");
    let anim = &clip.animations[0];
    assert!(anim.find_curve(TRANSFORM_VISIBLE).is_none());
    let Keyframes::Float3(keys) = &anim.find_curve(TRANSFORM_TRANSLATION).unwrap().keys else {
        panic!("expected float3 keys");
    };
    assert!(keys[0].value.near_equal(&Vec3::new(-1.0, 0.0, 0.0)));
    assert!(keys[1].value.near_equal(&Vec3::new(-2.0, 0.0, 0.0)));
}

#[test]
fn hierarchy_after_import() {
    let mut scene = frame(0.0);
    scene.entities[0].transform.rotation = quat_from_rotation_x(std::f32::consts::FRAC_PI_2);
    scene.import(&ImportSettings::default()).unwrap();
    scene.build_hierarchy();

    let cam = scene.find_entity("/world/cam").unwrap();
    assert_eq!(cam.parent, Some(0));
    let world = cam.world_matrix;
    let pos = Vec3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)]);
    // (0, 1, -10) rotated 90 degrees about X
    assert!(pos.near_equal(&Vec3::new(0.0, 10.0, 1.0)));
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[test]
fn send_slot_ships_encoded_frames() {
    let codec: Arc<dyn Codec> = Arc::new(Deflate::default());
    let mut slot = SendSlot::new();

    let scene = frame(0.0);
    let c = codec.clone();
    assert!(slot.try_begin(move || scene.to_bytes(c.as_ref())));

    let bytes = slot.wait().unwrap().as_ref().unwrap().clone();
    let received = Scene::from_bytes(&bytes, codec.as_ref()).unwrap();
    assert_eq!(received.entities.len(), 43);
}
