use annotation_engine::engine::commands::EngineCommand;
use annotation_engine::engine::entity::BoxSpec;
use annotation_engine::picking::scene::HoverTarget;
use annotation_engine::rpc::web_rpc::handle_rpc_message;
use annotation_engine::{
    AnnotationEngine, DrawMode, EngineConfig, EngineEvent, FrameBox, PointerOutcome, ViewKind,
};
use bevy::math::{Vec2, Vec3};
use pcd_decoder::DecodedPointCloud;
use std::sync::{Arc, Mutex};

fn scene() -> AnnotationEngine {
    let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
    engine.resize(ViewKind::Main, 800, 600);
    engine.resize(ViewKind::Top, 400, 300);
    engine
        .add_entity(
            BoxSpec::new("car-1", Vec3::new(0.0, 0.0, 0.8), Vec3::new(2.0, 4.0, 1.6))
                .with_category("car"),
        )
        .unwrap();
    engine
        .add_entity(BoxSpec::new("far", Vec3::new(200.0, 200.0, 0.0), Vec3::ONE))
        .unwrap();
    engine
}

fn recorded(engine: &mut AnnotationEngine) -> Arc<Mutex<Vec<EngineEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    engine.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    log
}

#[test]
fn picking_hits_the_box_and_background_deselects() {
    let mut engine = scene();
    let center = Vec2::new(400.0, 300.0);

    assert_eq!(engine.pick_id_at(ViewKind::Main, center), 1);
    assert_eq!(engine.pick(ViewKind::Main, center).as_deref(), Some("car-1"));
    assert_eq!(engine.active(), Some("car-1"));

    assert_eq!(engine.pick_id_at(ViewKind::Main, Vec2::new(2.0, 2.0)), 0);
    assert_eq!(engine.pick(ViewKind::Main, Vec2::new(2.0, 2.0)), None);
    assert_eq!(engine.active(), None);
}

#[test]
fn every_visible_box_is_picked_at_its_projected_center() {
    let mut engine = AnnotationEngine::with_defaults(EngineConfig::default()).unwrap();
    engine.resize(ViewKind::Main, 800, 600);
    let placed: Vec<(String, Vec3, u32)> = [
        ("left", Vec3::new(-6.0, 0.0, 0.75)),
        ("middle", Vec3::new(0.0, 0.0, 0.75)),
        ("right", Vec3::new(6.0, 0.0, 0.75)),
        ("behind", Vec3::new(0.0, 8.0, 0.75)),
    ]
    .into_iter()
    .map(|(name, center)| {
        let id = engine
            .add_entity(BoxSpec::new(name, center, Vec3::splat(1.5)))
            .unwrap();
        (name.to_string(), center, id)
    })
    .collect();

    for (name, center, id) in &placed {
        let pixel = engine
            .viewports()
            .rig(ViewKind::Main)
            .world_to_pixel(*center)
            .unwrap();
        assert_eq!(engine.pick_id_at(ViewKind::Main, pixel), *id, "{name}");
        assert_eq!(engine.pick(ViewKind::Main, pixel).as_deref(), Some(name.as_str()));
    }
    assert_eq!(engine.pick_id_at(ViewKind::Main, Vec2::new(5.0, 5.0)), 0);
}

#[test]
fn top_view_picks_and_hovers_the_active_box() {
    let mut engine = scene();
    let center = Vec2::new(200.0, 150.0);
    assert_eq!(engine.hover_probe(ViewKind::Top, center), None);

    engine.select("car-1").unwrap();
    assert_eq!(engine.pick_id_at(ViewKind::Top, center), 1);
    assert_eq!(
        engine.hover_probe(ViewKind::Top, center),
        Some(HoverTarget::Mesh)
    );
    assert_eq!(engine.hover_probe(ViewKind::Top, Vec2::new(3.0, 3.0)), None);
}

#[test]
fn selection_is_exclusive() {
    let mut engine = scene();
    engine.select("car-1").unwrap();
    engine.select("far").unwrap();

    let active: Vec<_> = engine
        .entities()
        .iter()
        .filter(|e| e.active)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(active, ["far"]);
    assert_eq!(engine.handles(), Some("far"));
}

#[test]
fn frame_diff_is_idempotent() {
    let mut engine = scene();
    let frame = [FrameBox {
        id: "car-1".into(),
        position: [1.0, 0.0, 0.8],
        rotation: [0.0, 0.0, 0.0],
        dimension: [2.0, 4.0, 1.6],
        point_count: None,
    }];

    let first = engine.diff_frame(&frame);
    assert_eq!((first.matched, first.ghosted), (1, 1));
    let snapshot = engine.entities().to_vec();

    let log = recorded(&mut engine);
    let second = engine.diff_frame(&frame);
    assert_eq!((second.matched, second.ghosted), (1, 1));
    assert_eq!(engine.entities(), snapshot.as_slice());
    assert!(
        !log.lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, EngineEvent::EntityGhosted { .. }))
    );

    let far = engine.entity("far").unwrap();
    assert!(far.ghosted && far.hidden);
    assert_eq!(engine.pick_id_at(ViewKind::Main, Vec2::new(2.0, 2.0)), 0);
}

#[test]
fn containment_label_tracks_the_cloud() {
    let mut engine = scene();
    let cloud = DecodedPointCloud::from_points(
        vec![
            0.0, 0.0, 0.5, //
            0.5, 1.5, 1.0, //
            5.0, 5.0, 0.5,
        ],
        Vec::new(),
    );
    engine.set_point_cloud(Arc::new(cloud));
    let car = engine.entity("car-1").unwrap();
    assert_eq!(car.contained_points, 2);
    assert_eq!(car.label, "Car 2");
}

#[test]
fn drag_to_size_creates_a_selected_box() {
    let mut engine = scene();
    engine.set_draw_mode(DrawMode::DragToSize);
    let start = Vec2::new(400.0, 300.0);

    assert_eq!(
        engine.pointer_down(ViewKind::Main, start),
        PointerOutcome::Sizing(None)
    );
    let outcome = engine.pointer_move(ViewKind::Main, start + Vec2::new(120.0, 80.0));
    let PointerOutcome::Sizing(Some(name)) = outcome else {
        panic!("expected a sized box, got {outcome:?}");
    };
    assert_eq!(
        engine.pointer_up(ViewKind::Main, start + Vec2::new(120.0, 80.0)),
        PointerOutcome::Created(name.clone())
    );
    assert_eq!(engine.active(), Some(name.as_str()));
}

#[test]
fn commands_queued_while_drawing_apply_after_the_frame() {
    struct Deleting;
    impl annotation_engine::engine::render::FrameRenderer for Deleting {
        fn render_view(
            &mut self,
            _rig: &annotation_engine::camera::ViewportRig,
            _zoom: f32,
            scene: &annotation_engine::engine::render::SceneView<'_>,
        ) {
            assert!(scene.entities.iter().any(|e| !e.hidden && e.name == "far"));
            scene.commands.push(EngineCommand::SoftDelete("far".into()));
        }
    }

    let mut engine = scene();
    assert!(engine.render_frame(&mut Deleting));
    assert!(engine.entity("far").unwrap().hidden);
}

#[test]
fn rpc_round_trip_through_raw_messages() {
    let mut engine = scene();
    let reply = handle_rpc_message(
        r#"{"jsonrpc":"2.0","method":"select_entity","params":{"name":"car-1"},"id":7}"#,
        &mut engine,
    )
    .unwrap();
    assert_eq!(reply.id, Some(serde_json::json!(7)));
    assert_eq!(engine.active(), Some("car-1"));

    let reply = handle_rpc_message(
        r#"{"jsonrpc":"2.0","method":"transform_active","params":{"op":"translate","delta":[1,0,0]},"id":8}"#,
        &mut engine,
    )
    .unwrap();
    assert!(reply.error.is_none());
    assert_eq!(
        engine.entity("car-1").unwrap().transform.translation,
        Vec3::new(1.0, 0.0, 0.8)
    );
}
